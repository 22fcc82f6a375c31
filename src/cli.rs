use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(
    author,
    version,
    about = "Send an email message from your Gmail account",
    long_about = None
)]
pub struct Cli {
    /// CC recipient (may be specified multiple times)
    #[clap(short, long)]
    pub cc: Vec<String>,

    /// Additional TO recipient (may be specified multiple times)
    #[clap(short, long)]
    pub to: Vec<String>,

    /// Attachment (may be specified multiple times)
    #[clap(short, long)]
    pub attach: Vec<PathBuf>,

    /// File containing the body of the message (by default, read from standard in)
    #[clap(short, long, value_name = "BODYFILE")]
    pub body: Option<PathBuf>,

    /// Don't print any info to say what is happening
    #[clap(short, long)]
    pub quiet: bool,

    /// The email address of the recipient
    pub recipient: String,

    /// Subject line
    #[clap(required = true, num_args = 1..)]
    pub subject: Vec<String>,
}

impl Cli {
    /// The positional recipient followed by every `--to`.
    pub fn recipients(&self) -> Vec<String> {
        std::iter::once(self.recipient.clone())
            .chain(self.to.iter().cloned())
            .collect()
    }

    pub fn subject_line(&self) -> String {
        self.subject.join(" ")
    }
}
