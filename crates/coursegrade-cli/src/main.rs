//! coursegrade CLI — the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use coursegrade_core::GradeType;

mod commands;

use commands::OutputFormat;

#[derive(Parser)]
#[command(name = "coursegrade", version, about = "Course grading and attendance tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Grade every student in a course
    Classify {
        /// Course id
        #[arg(long)]
        course: String,

        /// Grading mode: absolute or relative
        #[arg(long, default_value = "absolute")]
        grade_type: GradeType,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        /// Save the grade report as JSON into this directory
        #[arg(long)]
        output: Option<PathBuf>,

        /// Save the grade report into the configured report directory
        #[arg(long)]
        save: bool,

        /// Config file path
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Attendance views and updates
    Attendance {
        #[command(subcommand)]
        command: AttendanceCommands,
    },

    /// Assignment score updates
    Assignments {
        #[command(subcommand)]
        command: AssignmentCommands,
    },

    /// Validate a grading rule file
    Validate {
        /// Path to the rule TOML file
        #[arg(long)]
        rules: PathBuf,
    },

    /// Create starter config, rule file and sample course
    Init,
}

#[derive(Subcommand)]
enum AttendanceCommands {
    /// Attendance percentages for every student in a course
    Show {
        #[arg(long)]
        course: String,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// One student's attendance across courses
    Student {
        #[arg(long)]
        student: String,

        /// Course ids (comma-separated)
        #[arg(long, value_delimiter = ',', required = true)]
        courses: Vec<String>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
        format: OutputFormat,

        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Merge attendance observations from a JSON file
    Merge {
        #[arg(long)]
        course: String,

        /// JSON array of {student_id, attendance: [{date, status}]}
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AssignmentCommands {
    /// Upsert assignment scores from a JSON file
    Merge {
        #[arg(long)]
        course: String,

        /// JSON array of {student_id, name, score, max}
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("coursegrade=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Classify {
            course,
            grade_type,
            format,
            output,
            save,
            config,
        } => commands::classify::execute(course, grade_type, format, output, save, config).await,
        Commands::Attendance { command } => match command {
            AttendanceCommands::Show {
                course,
                format,
                config,
            } => commands::attendance::show(course, format, config).await,
            AttendanceCommands::Student {
                student,
                courses,
                format,
                config,
            } => commands::attendance::student(student, courses, format, config).await,
            AttendanceCommands::Merge {
                course,
                input,
                config,
            } => commands::attendance::merge(course, input, config).await,
        },
        Commands::Assignments { command } => match command {
            AssignmentCommands::Merge {
                course,
                input,
                config,
            } => commands::assignments::merge(course, input, config).await,
        },
        Commands::Validate { rules } => commands::validate::execute(rules),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
