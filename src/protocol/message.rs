use crate::error::{JudgeError, Result};
use crate::scheduler::Job;

const ADMIN_PREFIX: &str = "ADMIN";
const TOKEN_PREFIX: &str = "TOKEN=";

/// Language tokens of the legacy line form.
const LEGACY_LANGUAGES: [&str; 5] = ["PYTHON", "C", "CPP", "C++", "JAVA"];

/// A parsed inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Execute(Job),
    Admin(AdminRequest),
}

/// `ADMIN|[TOKEN=<secret>|]SUBCOMMAND[|value]`, before validation of the
/// subcommand itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminRequest {
    pub token: Option<String>,
    pub subcommand: String,
    pub argument: Option<String>,
}

impl Request {
    /// Parse the delimited or admin form.
    pub fn parse_delimited(text: &str) -> Result<Self> {
        if is_admin(text) {
            return AdminRequest::parse(text).map(Request::Admin);
        }

        let mut fields = text.splitn(3, '|');
        let (Some(language), Some(filename), Some(source)) =
            (fields.next(), fields.next(), fields.next())
        else {
            return Err(JudgeError::Protocol(
                "expected language|filename|source".to_string(),
            ));
        };

        let language = language.trim();
        if language.is_empty() {
            return Err(JudgeError::Protocol("missing language".to_string()));
        }

        Ok(Request::Execute(Job::new(language, filename.trim(), source)))
    }

    /// Build a request from a legacy frame. Legacy frames carry no file name:
    /// Java sources are compiled as `Main.java`, the rest get a generated name.
    pub fn from_legacy(language: &str, source: String) -> Self {
        let filename = if language.eq_ignore_ascii_case("JAVA") {
            "Main.java"
        } else {
            ""
        };
        Request::Execute(Job::new(language, filename, source))
    }
}

impl AdminRequest {
    fn parse(text: &str) -> Result<Self> {
        let text = text.trim_end_matches(['\r', '\n']);
        let mut fields = text.split('|').skip(1).map(str::trim).peekable();

        let token = match fields.peek() {
            Some(field) if field.starts_with(TOKEN_PREFIX) => {
                let token = field[TOKEN_PREFIX.len()..].to_string();
                fields.next();
                Some(token)
            }
            _ => None,
        };

        let Some(subcommand) = fields.next().filter(|s| !s.is_empty()) else {
            return Err(JudgeError::Protocol(
                "ADMIN request without subcommand".to_string(),
            ));
        };
        let mut argument = fields.next().map(str::to_string);
        if fields.next().is_some() {
            return Err(JudgeError::Protocol(
                "too many fields in ADMIN request".to_string(),
            ));
        }

        // `SET_MAX_TASKS 3` is accepted as well as `SET_MAX_TASKS|3`.
        let mut subcommand = subcommand.to_string();
        if argument.is_none() {
            if let Some((name, value)) = subcommand.split_once(char::is_whitespace) {
                argument = Some(value.trim().to_string());
                subcommand = name.to_string();
            }
        }

        Ok(Self {
            token,
            subcommand: subcommand.to_ascii_uppercase(),
            argument,
        })
    }

    /// Encode for the wire.
    pub fn to_wire(&self) -> String {
        let mut text = String::from(ADMIN_PREFIX);
        if let Some(token) = &self.token {
            text.push('|');
            text.push_str(TOKEN_PREFIX);
            text.push_str(token);
        }
        text.push('|');
        text.push_str(&self.subcommand);
        if let Some(argument) = &self.argument {
            text.push('|');
            text.push_str(argument);
        }
        text
    }
}

fn is_admin(text: &str) -> bool {
    text.len() > ADMIN_PREFIX.len()
        && text.as_bytes()[ADMIN_PREFIX.len()] == b'|'
        && text[..ADMIN_PREFIX.len()].eq_ignore_ascii_case(ADMIN_PREFIX)
}

/// True when `line` is one of the legacy language tokens.
pub fn is_legacy_language(line: &str) -> bool {
    let line = line.trim();
    LEGACY_LANGUAGES
        .iter()
        .any(|token| token.eq_ignore_ascii_case(line))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn execute(text: &str) -> Job {
        match Request::parse_delimited(text).unwrap() {
            Request::Execute(job) => job,
            other => panic!("expected execute request, got {other:?}"),
        }
    }

    fn admin(text: &str) -> AdminRequest {
        match Request::parse_delimited(text).unwrap() {
            Request::Admin(req) => req,
            other => panic!("expected admin request, got {other:?}"),
        }
    }

    #[test]
    fn parses_delimited_execute() {
        let job = execute("python|main.py|print(2+2)\n");
        assert_eq!(job.language, "python");
        assert_eq!(job.filename, "main.py");
        assert_eq!(job.source, "print(2+2)\n");
    }

    #[test]
    fn source_may_contain_delimiters() {
        let job = execute("c|a.c|int main(){return 0|0;}");
        assert_eq!(job.source, "int main(){return 0|0;}");
    }

    #[test]
    fn rejects_too_few_fields() {
        for text in ["python", "python|main.py", ""] {
            assert!(matches!(
                Request::parse_delimited(text),
                Err(JudgeError::Protocol(_))
            ));
        }
    }

    #[test]
    fn rejects_empty_language() {
        assert!(Request::parse_delimited(" |a.py|print(1)").is_err());
    }

    #[test]
    fn parses_admin_forms() {
        let req = admin("ADMIN|GET_INFO");
        assert_eq!(req.subcommand, "GET_INFO");
        assert!(req.token.is_none());
        assert!(req.argument.is_none());

        let req = admin("ADMIN|SET_MAX_TASKS|3\n");
        assert_eq!(req.subcommand, "SET_MAX_TASKS");
        assert_eq!(req.argument.as_deref(), Some("3"));

        let req = admin("ADMIN|TOKEN=s3cret|set_max_slaves|2");
        assert_eq!(req.token.as_deref(), Some("s3cret"));
        assert_eq!(req.subcommand, "SET_MAX_SLAVES");
        assert_eq!(req.argument.as_deref(), Some("2"));

        let req = admin("admin|SET_MAX_TASKS 4");
        assert_eq!(req.subcommand, "SET_MAX_TASKS");
        assert_eq!(req.argument.as_deref(), Some("4"));
    }

    #[test]
    fn rejects_malformed_admin() {
        assert!(Request::parse_delimited("ADMIN|").is_err());
        assert!(Request::parse_delimited("ADMIN|TOKEN=x").is_err());
        assert!(Request::parse_delimited("ADMIN|SET_MAX_TASKS|1|2").is_err());
    }

    #[test]
    fn admin_prefix_must_be_a_whole_field() {
        // A language tag that merely starts with "admin" is an execute request.
        let job = execute("administrator|a.py|x");
        assert_eq!(job.language, "administrator");
    }

    #[test]
    fn admin_wire_round_trip() {
        let req = AdminRequest {
            token: Some("t".into()),
            subcommand: "SET_MAX_TASKS".into(),
            argument: Some("7".into()),
        };
        assert_eq!(req.to_wire(), "ADMIN|TOKEN=t|SET_MAX_TASKS|7");
        assert_eq!(admin(&req.to_wire()), req);
    }

    #[test]
    fn legacy_tokens() {
        for token in ["PYTHON", "C", "CPP", "C++", "JAVA", "java\r"] {
            assert!(is_legacy_language(token), "{token}");
        }
        assert!(!is_legacy_language("RUST"));
        assert!(!is_legacy_language("python|a.py|x"));
    }

    #[test]
    fn legacy_java_uses_main() {
        match Request::from_legacy("JAVA", "class Main {}".into()) {
            Request::Execute(job) => assert_eq!(job.filename, "Main.java"),
            other => panic!("unexpected {other:?}"),
        }
        match Request::from_legacy("PYTHON", "print(1)".into()) {
            Request::Execute(job) => assert!(job.filename.is_empty()),
            other => panic!("unexpected {other:?}"),
        }
    }
}
