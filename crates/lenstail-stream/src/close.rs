//! WebSocket close-code tables and close diagnostics.

/// Human text for RFC 6455 and graphql-transport-ws close codes.
pub fn describe_close_code(code: u16) -> &'static str {
    match code {
        // RFC close codes
        1000 => "Normal Closure",
        1001 => "Going Away",
        1002 => "Protocol Error",
        1003 => "Unsupported Data",
        1005 => "No Status Received (reserved)",
        1006 => "Abnormal Closure (no close frame)",
        1007 => "Invalid Payload",
        1008 => "Policy Violation",
        1009 => "Message Too Big",
        1010 => "Mandatory Extension",
        1011 => "Internal Error",
        1012 => "Service Restart",
        1013 => "Try Again Later",
        1015 => "TLS Handshake Failure",
        // graphql-transport-ws codes
        4400 => "Bad Request",
        4401 => "Unauthorized",
        4403 => "Forbidden",
        4404 => "Subscription Not Found",
        4409 => "Subscriber ID Not Unique",
        4429 => "Too Many Requests",
        _ => "Unrecognized close code",
    }
}

/// Close codes that mean the bearer token is no longer accepted and the next
/// attempt should start on the short floor with a fresh token.
pub fn is_auth_close(code: u16) -> bool {
    matches!(code, 4401 | 4403)
}

/// Compose the single human diagnostic for a closed socket.
///
/// Preference order for the "why": server-supplied reason text, then the
/// last local close hint, then the standard code description. The hint is
/// consumed exactly once by the caller.
pub fn compose_diagnostic(code: u16, reason: &str, hint: Option<&str>) -> String {
    let reason = reason.trim();
    let why = if !reason.is_empty() {
        reason
    } else if let Some(hint) = hint.filter(|h| !h.is_empty()) {
        hint
    } else {
        describe_close_code(code)
    };
    format!("{code} ({}) - {why}", describe_close_code(code))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codes_have_text() {
        assert_eq!(describe_close_code(1000), "Normal Closure");
        assert_eq!(describe_close_code(1006), "Abnormal Closure (no close frame)");
        assert_eq!(describe_close_code(4401), "Unauthorized");
        assert_eq!(describe_close_code(4403), "Forbidden");
        assert_eq!(describe_close_code(4429), "Too Many Requests");
    }

    #[test]
    fn unknown_code_falls_back() {
        assert_eq!(describe_close_code(4999), "Unrecognized close code");
    }

    #[test]
    fn auth_close_codes() {
        assert!(is_auth_close(4401));
        assert!(is_auth_close(4403));
        assert!(!is_auth_close(1000));
        assert!(!is_auth_close(4400));
        assert!(!is_auth_close(4429));
    }

    #[test]
    fn diagnostic_prefers_server_reason() {
        let diag = compose_diagnostic(1011, "server restarting", Some("heartbeat watchdog"));
        assert_eq!(diag, "1011 (Internal Error) - server restarting");
    }

    #[test]
    fn diagnostic_falls_back_to_hint() {
        let diag = compose_diagnostic(1006, "", Some("heartbeat watchdog: no pong within 30s"));
        assert!(diag.contains("heartbeat watchdog"));
        assert!(diag.starts_with("1006"));
    }

    #[test]
    fn diagnostic_falls_back_to_code_text() {
        let diag = compose_diagnostic(4403, "", None);
        assert_eq!(diag, "4403 (Forbidden) - Forbidden");
    }
}
