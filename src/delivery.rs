// Outbound delivery of a rendered report.
//
// Settings arrive per call; the SMTP transport is built from them and nothing
// is cached between sends. One attempt only: a failure is returned to the
// caller, who still has the file.
use crate::config::SmtpSettings;
use crate::error::ReportError;
use lettre::{
    message::{header::ContentType, Attachment, Mailbox, MultiPart, SinglePart},
    transport::smtp::authentication::Credentials,
    Message, SmtpTransport, Transport,
};
use tracing::info;

const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const REPORT_SUBJECT: &str = "Property Report";
pub const ATTACHMENT_NAME: &str = "report.xlsx";

#[derive(Debug, Clone, PartialEq)]
pub struct OutgoingMail {
    pub to: String,
    pub to_name: String,
    pub subject: String,
    pub body: String,
    pub attachment_name: String,
    pub attachment: Vec<u8>,
}

pub trait Mailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), ReportError>;
}

/// `john.doe` -> `john.doe@<domain>`; a full address is used unchanged.
pub fn derive_address(identifier: &str, domain: &str) -> Result<String, ReportError> {
    let id = identifier.trim();
    if id.is_empty() {
        return Err(ReportError::DeliveryFailure("recipient is empty".to_string()));
    }
    if id.contains('@') {
        return Ok(id.to_string());
    }
    let domain = domain.trim().trim_start_matches('@');
    if domain.is_empty() {
        return Err(ReportError::Configuration(
            "recipient domain is not configured".to_string(),
        ));
    }
    Ok(format!("{}@{}", id.to_ascii_lowercase(), domain))
}

/// `john.doe` -> `John Doe`. Only the local part of a full address is used.
pub fn display_name(identifier: &str) -> String {
    let local = identifier.trim().split('@').next().unwrap_or_default();
    local
        .split(['.', '_'])
        .filter(|p| !p.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

pub fn compose_report_mail(
    identifier: &str,
    settings: &SmtpSettings,
    workbook: Vec<u8>,
) -> Result<OutgoingMail, ReportError> {
    let to = derive_address(identifier, &settings.recipient_domain)?;
    let to_name = display_name(identifier);
    let body = format!(
        "Hi {},\n\nPlease find attached the property report.\n\nRegards,\n{}\n",
        to_name, settings.from_name
    );
    Ok(OutgoingMail {
        to,
        to_name,
        subject: REPORT_SUBJECT.to_string(),
        body,
        attachment_name: ATTACHMENT_NAME.to_string(),
        attachment: workbook,
    })
}

/// Compose and send the report; returns the address it went to.
pub fn send_report(
    mailer: &dyn Mailer,
    settings: &SmtpSettings,
    identifier: &str,
    workbook: Vec<u8>,
) -> Result<String, ReportError> {
    let mail = compose_report_mail(identifier, settings, workbook)?;
    mailer.send(&mail)?;
    info!(to = %mail.to, bytes = mail.attachment.len(), "report sent");
    Ok(mail.to)
}

pub struct SmtpMailer {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpMailer {
    pub fn new(settings: &SmtpSettings) -> Result<Self, ReportError> {
        let creds = Credentials::new(settings.username.clone(), settings.password.clone());
        let transport = SmtpTransport::relay(&settings.host)
            .map_err(|e| ReportError::DeliveryFailure(format!("cannot create SMTP transport: {}", e)))?
            .port(settings.port)
            .credentials(creds)
            .build();
        let from = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse::<Mailbox>()
            .map_err(|e| ReportError::Configuration(format!("invalid sender address: {}", e)))?;
        Ok(Self { transport, from })
    }
}

impl Mailer for SmtpMailer {
    fn send(&self, mail: &OutgoingMail) -> Result<(), ReportError> {
        let to = format!("{} <{}>", mail.to_name, mail.to)
            .parse::<Mailbox>()
            .map_err(|e| ReportError::DeliveryFailure(format!("invalid recipient address: {}", e)))?;
        let content_type = ContentType::parse(XLSX_MIME)
            .map_err(|e| ReportError::DeliveryFailure(format!("bad attachment type: {}", e)))?;
        let attachment = Attachment::new(mail.attachment_name.clone()).body(mail.attachment.clone(), content_type);

        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(&mail.subject)
            .multipart(
                MultiPart::mixed()
                    .singlepart(SinglePart::plain(mail.body.clone()))
                    .singlepart(attachment),
            )
            .map_err(|e| ReportError::DeliveryFailure(format!("failed to build email: {}", e)))?;

        self.transport
            .send(&email)
            .map_err(|e| ReportError::DeliveryFailure(format!("SMTP send failed: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Default)]
    struct RecordingMailer {
        sent: RefCell<Vec<OutgoingMail>>,
    }

    impl Mailer for RecordingMailer {
        fn send(&self, mail: &OutgoingMail) -> Result<(), ReportError> {
            self.sent.borrow_mut().push(mail.clone());
            Ok(())
        }
    }

    struct FailingMailer;

    impl Mailer for FailingMailer {
        fn send(&self, _mail: &OutgoingMail) -> Result<(), ReportError> {
            Err(ReportError::DeliveryFailure("connection refused".to_string()))
        }
    }

    fn settings() -> SmtpSettings {
        SmtpSettings {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "reports".to_string(),
            password: "secret".to_string(),
            from_email: "reports@example.com".to_string(),
            from_name: "Reports Desk".to_string(),
            recipient_domain: "example.com".to_string(),
        }
    }

    #[test]
    fn address_from_first_last() {
        assert_eq!(derive_address("john.doe", "example.com").unwrap(), "john.doe@example.com");
        assert_eq!(derive_address(" Jane.Roe ", "@example.com").unwrap(), "jane.roe@example.com");
        assert_eq!(derive_address("a@b.org", "example.com").unwrap(), "a@b.org");
        assert!(matches!(derive_address("", "example.com"), Err(ReportError::DeliveryFailure(_))));
        assert!(matches!(derive_address("john.doe", " "), Err(ReportError::Configuration(_))));
    }

    #[test]
    fn display_name_capitalises_parts() {
        assert_eq!(display_name("john.doe"), "John Doe");
        assert_eq!(display_name("MARY_ann.smith@x.com"), "Mary Ann Smith");
    }

    #[test]
    fn sends_templated_mail_with_attachment() {
        let mailer = RecordingMailer::default();
        let to = send_report(&mailer, &settings(), "john.doe", vec![1, 2, 3]).unwrap();
        assert_eq!(to, "john.doe@example.com");
        let sent = mailer.sent.borrow();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, REPORT_SUBJECT);
        assert!(sent[0].body.starts_with("Hi John Doe,"));
        assert_eq!(sent[0].attachment_name, "report.xlsx");
        assert_eq!(sent[0].attachment, vec![1, 2, 3]);
    }

    #[test]
    fn failure_is_reported_once() {
        let err = send_report(&FailingMailer, &settings(), "john.doe", vec![]).unwrap_err();
        assert!(matches!(err, ReportError::DeliveryFailure(ref m) if m.contains("refused")));
    }
}
