//! MIME assembly for outgoing mail.

use crate::error::{Error, Result};
use crate::types::EncodedEnvelope;
use base64::engine::general_purpose::URL_SAFE;
use base64::engine::Engine;
use lettre::message::header::ContentType;
use lettre::message::{Attachment, Body, Mailbox, MultiPart, SinglePart};
use lettre::Message;
use mime_guess::mime::{self, Mime};
use std::path::{Path, PathBuf};

// Suffixes that describe a compression encoding rather than a content type
const ENCODING_SUFFIXES: &[&str] = &["gz", "Z", "bz2", "xz", "br", "tgz", "taz", "tz"];

/// Everything needed to compose one message.
#[derive(Debug, Clone, Default)]
pub struct OutgoingMessage {
    pub from: String,
    pub to: Vec<String>,
    pub cc: Vec<String>,
    pub subject: String,
    pub body: String,
    /// Sent in this order after the body.
    pub attachments: Vec<PathBuf>,
}

/// Guess an attachment's content type from its file name.
pub fn guess_content_type(path: &Path) -> Mime {
    let encoded = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ENCODING_SUFFIXES.contains(&ext));
    if encoded {
        return mime::APPLICATION_OCTET_STREAM;
    }
    mime_guess::from_path(path).first_or_octet_stream()
}

fn parse_mailbox(address: &str) -> Result<Mailbox> {
    address.parse().map_err(|e: lettre::address::AddressError| Error::InvalidAddress {
        address: address.to_string(),
        reason: e.to_string(),
    })
}

fn attachment_part(path: &Path) -> Result<SinglePart> {
    let bytes = std::fs::read(path).map_err(|source| Error::AttachmentNotFound {
        path: path.to_path_buf(),
        source,
    })?;

    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "attachment".to_string());

    let guessed = guess_content_type(path);
    let (body, content_type) = if guessed.type_() == mime::TEXT {
        match String::from_utf8(bytes) {
            Ok(text) => (Body::new(text), format!("{}; charset=utf-8", guessed.essence_str())),
            Err(e) => (Body::new(e.into_bytes()), guessed.essence_str().to_string()),
        }
    } else {
        (Body::new(bytes), guessed.essence_str().to_string())
    };
    let content_type = ContentType::parse(&content_type)
        .map_err(|e| Error::Message(format!("content type '{}': {}", content_type, e)))?;

    tracing::debug!(file = %filename, content_type = %guessed, "Attaching file");
    Ok(Attachment::new(filename).body(body, content_type))
}

/// Compose the MIME message and wrap it for `users.messages.send`.
pub fn build_message(message: &OutgoingMessage) -> Result<Message> {
    if message.to.is_empty() {
        return Err(Error::NoRecipients);
    }

    // Read every attachment before composing so a bad path fails fast
    let attachments = message
        .attachments
        .iter()
        .map(|path| attachment_part(path))
        .collect::<Result<Vec<_>>>()?;

    let mut builder = Message::builder()
        .from(parse_mailbox(&message.from)?)
        .subject(message.subject.as_str());
    for address in &message.to {
        builder = builder.to(parse_mailbox(address)?);
    }
    for address in &message.cc {
        builder = builder.cc(parse_mailbox(address)?);
    }

    let text_part = SinglePart::plain(message.body.clone());
    let built = if attachments.is_empty() {
        builder.singlepart(text_part)
    } else {
        let multipart = attachments
            .into_iter()
            .fold(MultiPart::mixed().singlepart(text_part), |multi, part| {
                multi.singlepart(part)
            });
        builder.multipart(multipart)
    };

    built.map_err(|e| Error::Message(e.to_string()))
}

pub fn encode_envelope(message: &Message) -> EncodedEnvelope {
    EncodedEnvelope {
        raw: URL_SAFE.encode(message.formatted()),
    }
}

pub fn build_envelope(message: &OutgoingMessage) -> Result<EncodedEnvelope> {
    let envelope = encode_envelope(&build_message(message)?);
    tracing::debug!(bytes = envelope.len(), "Encoded MIME envelope");
    Ok(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mailparse::{addrparse, DispositionType, MailAddrList, MailHeaderMap, ParsedMail};

    fn decode(envelope: &EncodedEnvelope) -> Vec<u8> {
        URL_SAFE.decode(&envelope.raw).unwrap()
    }

    fn simple_message() -> OutgoingMessage {
        OutgoingMessage {
            from: "A <a@b.com>".to_string(),
            to: vec!["bob@example.com".to_string()],
            subject: "Hello World".to_string(),
            body: "hi".to_string(),
            ..Default::default()
        }
    }

    fn header(parsed: &ParsedMail, name: &str) -> Option<String> {
        parsed.headers.get_first_value(name)
    }

    fn addresses(parsed: &ParsedMail, name: &str) -> MailAddrList {
        addrparse(&header(parsed, name).unwrap()).unwrap()
    }

    #[test]
    fn test_display_names_round_trip_as_mailboxes() {
        let mut message = simple_message();
        message.from = "Alice Example <alice@example.com>".to_string();
        message.to = vec![
            "Bob Builder <bob@example.com>".to_string(),
            "carol@example.com".to_string(),
        ];
        message.cc = vec!["\"Doe, Jane\" <jane@example.com>".to_string()];

        let bytes = decode(&build_envelope(&message).unwrap());
        let parsed = mailparse::parse_mail(&bytes).unwrap();

        // Names may be re-quoted, but name and address must survive
        assert_eq!(
            addresses(&parsed, "From"),
            addrparse("Alice Example <alice@example.com>").unwrap()
        );
        assert_eq!(
            addresses(&parsed, "To"),
            addrparse("Bob Builder <bob@example.com>, carol@example.com").unwrap()
        );
        assert_eq!(
            addresses(&parsed, "Cc"),
            addrparse("\"Doe, Jane\" <jane@example.com>").unwrap()
        );
    }

    #[test]
    fn test_plain_message_round_trips_headers_and_body() {
        let envelope = build_envelope(&simple_message()).unwrap();
        let bytes = decode(&envelope);
        let parsed = mailparse::parse_mail(&bytes).unwrap();

        assert_eq!(header(&parsed, "To").as_deref(), Some("bob@example.com"));
        assert_eq!(header(&parsed, "From").as_deref(), Some("A <a@b.com>"));
        assert_eq!(header(&parsed, "Subject").as_deref(), Some("Hello World"));
        assert_eq!(parsed.get_body().unwrap().trim_end(), "hi");
    }

    #[test]
    fn test_no_attachments_is_single_text_part() {
        let envelope = build_envelope(&simple_message()).unwrap();
        let bytes = decode(&envelope);
        let parsed = mailparse::parse_mail(&bytes).unwrap();

        assert_eq!(parsed.ctype.mimetype, "text/plain");
        assert!(parsed.subparts.is_empty());
        assert!(header(&parsed, "Content-Disposition").is_none());
        assert!(header(&parsed, "Cc").is_none());
    }

    #[test]
    fn test_recipients_are_comma_joined_and_cc_present() {
        let mut message = simple_message();
        message.to.push("carol@example.com".to_string());
        message.cc = vec!["dave@example.com".to_string(), "erin@example.com".to_string()];

        let bytes = decode(&build_envelope(&message).unwrap());
        let parsed = mailparse::parse_mail(&bytes).unwrap();

        assert_eq!(
            header(&parsed, "To").as_deref(),
            Some("bob@example.com, carol@example.com")
        );
        assert_eq!(
            header(&parsed, "Cc").as_deref(),
            Some("dave@example.com, erin@example.com")
        );
    }

    #[test]
    fn test_attachments_follow_body_in_input_order() {
        let tmp = tempfile::tempdir().unwrap();
        let notes = tmp.path().join("notes.txt");
        let photo = tmp.path().join("photo.png");
        let blob = tmp.path().join("data.bin");
        std::fs::write(&notes, "line one\n").unwrap();
        std::fs::write(&photo, [0x89, b'P', b'N', b'G', 0, 1, 2, 3]).unwrap();
        std::fs::write(&blob, [0u8, 159, 146, 150]).unwrap();

        let mut message = simple_message();
        message.attachments = vec![photo, notes, blob];

        let bytes = decode(&build_envelope(&message).unwrap());
        let parsed = mailparse::parse_mail(&bytes).unwrap();

        assert_eq!(parsed.ctype.mimetype, "multipart/mixed");
        assert_eq!(parsed.subparts.len(), 1 + 3);
        assert_eq!(parsed.subparts[0].ctype.mimetype, "text/plain");
        assert_eq!(parsed.subparts[0].get_body().unwrap().trim_end(), "hi");

        let names: Vec<String> = parsed.subparts[1..]
            .iter()
            .map(|part| {
                let disposition = part.get_content_disposition();
                assert_eq!(disposition.disposition, DispositionType::Attachment);
                disposition.params.get("filename").cloned().unwrap()
            })
            .collect();
        assert_eq!(names, vec!["photo.png", "notes.txt", "data.bin"]);

        assert_eq!(parsed.subparts[1].ctype.mimetype, "image/png");
        assert_eq!(parsed.subparts[2].ctype.mimetype, "text/plain");
        assert_eq!(parsed.subparts[3].ctype.mimetype, "application/octet-stream");
        assert_eq!(
            parsed.subparts[3].get_body_raw().unwrap(),
            vec![0u8, 159, 146, 150]
        );
    }

    #[test]
    fn test_attachment_filename_drops_directories() {
        let tmp = tempfile::tempdir().unwrap();
        let nested = tmp.path().join("deep").join("er");
        std::fs::create_dir_all(&nested).unwrap();
        let report = nested.join("report.pdf");
        std::fs::write(&report, b"%PDF-1.4").unwrap();

        let mut message = simple_message();
        message.attachments = vec![report];

        let bytes = decode(&build_envelope(&message).unwrap());
        let parsed = mailparse::parse_mail(&bytes).unwrap();
        let disposition = parsed.subparts[1].get_content_disposition();
        assert_eq!(
            disposition.params.get("filename").map(String::as_str),
            Some("report.pdf")
        );
    }

    #[test]
    fn test_missing_attachment_fails() {
        let mut message = simple_message();
        message.attachments = vec![PathBuf::from("/definitely/not/here.pdf")];

        let result = build_envelope(&message);
        assert!(matches!(result, Err(Error::AttachmentNotFound { .. })));
    }

    #[test]
    fn test_guess_content_type() {
        assert_eq!(guess_content_type(Path::new("a.txt")), mime::TEXT_PLAIN);
        assert_eq!(guess_content_type(Path::new("a.png")), mime::IMAGE_PNG);
        assert_eq!(
            guess_content_type(Path::new("archive.tar.gz")),
            mime::APPLICATION_OCTET_STREAM
        );
        for name in ["backup.tgz", "backup.taz", "backup.tz"] {
            assert_eq!(
                guess_content_type(Path::new(name)),
                mime::APPLICATION_OCTET_STREAM,
                "{}",
                name
            );
        }
        assert_eq!(
            guess_content_type(Path::new("no_extension")),
            mime::APPLICATION_OCTET_STREAM
        );
    }

    #[test]
    fn test_empty_recipients_rejected() {
        let mut message = simple_message();
        message.to.clear();
        assert!(matches!(build_envelope(&message), Err(Error::NoRecipients)));
    }

    #[test]
    fn test_invalid_address_rejected() {
        let mut message = simple_message();
        message.cc = vec!["not an address".to_string()];
        assert!(matches!(
            build_envelope(&message),
            Err(Error::InvalidAddress { .. })
        ));
    }
}
