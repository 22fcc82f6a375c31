use crate::cli::Cli;
use crate::config::{ConfigStore, Configuration};
use crate::error::{Error, Result};
use crate::gmail_api::{
    AuthorizedClient, CredentialManager, GoogleOAuthFlow, MailTransport, OAuthFlow, ME,
};
use crate::message::{build_envelope, OutgoingMessage};
use crate::types::SentReceipt;
use std::io::{self, IsTerminal, Read};
use std::path::Path;

/// User-facing progress lines, silenced by `--quiet`.
#[derive(Debug, Clone, Copy)]
pub struct Progress {
    quiet: bool,
}

impl Progress {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    pub fn say(&self, line: &str) {
        if !self.quiet {
            println!("{}", line);
        }
    }
}

#[derive(Debug)]
pub struct SendSummary {
    pub receipt: SentReceipt,
    pub encoded_len: usize,
    pub recipients: Vec<String>,
}

impl SendSummary {
    pub fn line(&self) -> String {
        format!(
            "Success! Sent {} bytes to {:?}",
            self.encoded_len, self.recipients
        )
    }
}

/// Read the whole message body from `source`, or standard input when absent.
pub fn read_body(source: Option<&Path>, progress: &Progress) -> Result<String> {
    match source {
        Some(path) => {
            progress.say(&format!("Reading message body from '{}'...", path.display()));
            std::fs::read_to_string(path).map_err(|source| Error::BodyUnreadable {
                path: path.to_path_buf(),
                source,
            })
        }
        None => {
            let stdin = io::stdin();
            if stdin.is_terminal() {
                progress.say("Type the body of your message below, followed by EOF (Ctrl-D)");
            } else {
                progress.say("Reading message body from standard in...");
            }
            let mut body = String::new();
            stdin.lock().read_to_string(&mut body)?;
            Ok(body)
        }
    }
}

/// Build, authorize and send one message.
///
/// The message is composed before any credential is touched, so a bad
/// attachment never triggers a token refresh or a consent prompt.
pub async fn deliver<F, T, C>(
    message: &OutgoingMessage,
    config: &Configuration,
    credentials: &CredentialManager<F>,
    connect: C,
    progress: &Progress,
) -> Result<SendSummary>
where
    F: OAuthFlow,
    T: MailTransport,
    C: FnOnce(AuthorizedClient) -> T,
{
    progress.say("Creating MIME message...");
    let envelope = build_envelope(message)?;

    progress.say("Trying to read credentials and connect to gmail...");
    let client = credentials.authorized_client(config).await?;
    let transport = connect(client);
    progress.say("Connected successfully.");

    progress.say("Sending message to gmail...");
    let receipt = transport.send_message(ME, &envelope).await?;

    Ok(SendSummary {
        receipt,
        encoded_len: envelope.len(),
        recipients: message.to.clone(),
    })
}

pub async fn run(cli: Cli) -> Result<()> {
    let progress = Progress::new(cli.quiet);

    let store = ConfigStore::from_env()?;
    let config = {
        let stdin = io::stdin();
        let mut stdout = io::stdout();
        store.load(&mut stdin.lock(), &mut stdout)?
    };
    tracing::debug!(config_dir = %store.dir().display(), "Configuration loaded");

    let body = read_body(cli.body.as_deref(), &progress)?;
    let message = OutgoingMessage {
        from: config.from_address.clone(),
        to: cli.recipients(),
        cc: cli.cc.clone(),
        subject: cli.subject_line(),
        body,
        attachments: cli.attach.clone(),
    };

    let credentials = CredentialManager::new(GoogleOAuthFlow::new());
    let summary = deliver(&message, &config, &credentials, |client| client, &progress).await?;

    progress.say(&summary.line());
    Ok(())
}
