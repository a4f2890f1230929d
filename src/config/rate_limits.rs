use time::OffsetDateTime;

/// Actions that are counted against a fixed-window limit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateAction {
    Login,
    Register,
    SubmitReport,
    Claim,
}

impl RateAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Register => "register",
            Self::SubmitReport => "report",
            Self::Claim => "claim",
        }
    }

    /// Limit and window for the action. Login and registration are keyed by
    /// client IP, the rest by authenticated user.
    pub fn limit(&self) -> (u32, RateWindow) {
        match self {
            Self::Login => (10, RateWindow::Hour),
            Self::Register => (5, RateWindow::Day),
            Self::SubmitReport => (20, RateWindow::Hour),
            Self::Claim => (30, RateWindow::Hour),
        }
    }
}

/// Time window for rate limiting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateWindow {
    Hour,
    Day,
}

impl RateWindow {
    pub fn seconds(&self) -> u64 {
        match self {
            RateWindow::Hour => 3600,
            RateWindow::Day => 86400,
        }
    }
}

/// Index of the window containing the current instant.
pub fn current_window(window_seconds: u64) -> u64 {
    let now = OffsetDateTime::now_utc().unix_timestamp().max(0) as u64;
    now / window_seconds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limits_match_configuration() {
        assert_eq!(RateAction::Login.limit(), (10, RateWindow::Hour));
        assert_eq!(RateAction::Register.limit(), (5, RateWindow::Day));
        assert!(RateAction::Claim.limit().0 > RateAction::SubmitReport.limit().0);
    }

    #[test]
    fn window_index_is_stable_within_a_window() {
        let a = current_window(RateWindow::Day.seconds());
        let b = current_window(RateWindow::Day.seconds());
        assert!(b == a || b == a + 1);
    }
}
