/// Outcome of an edit that did not fail
///
/// `Warn` means the packet was processed but something looked suspicious,
/// for ex. an L4 header too short to be checksummed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Ok,
    Warn(String),
}

impl Status {
    pub fn warn<S: Into<String>>(msg: S) -> Self {
        Status::Warn(msg.into())
    }

    pub fn is_warn(&self) -> bool {
        matches!(self, Status::Warn(_))
    }
}

#[cfg(test)]
mod tests {
    use super::Status;

    #[test]
    fn status_warn() {
        assert!(!Status::Ok.is_warn());
        assert!(Status::warn("short UDP header").is_warn());
        assert_eq!(Status::default(), Status::Ok);
    }
}
