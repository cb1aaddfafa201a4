//! Stdio readiness sentinels.
//!
//! Some clients wait for a plain-text banner, others for a JSON-RPC
//! notification. The dispatcher knows nothing about these lines; the stdio
//! adapter writes them once before reading input.

use serde_json::json;

use super::protocol::{JsonRpcNotification, MCPServerInfo};
use crate::core::HandshakeMode;

/// Plain-text banner line.
pub const READY_BANNER: &str = "MCP server ready";

/// Lines to write at startup for the given mode.
pub fn sentinels(mode: HandshakeMode, info: &MCPServerInfo) -> Result<Vec<String>, serde_json::Error> {
    let ready = JsonRpcNotification::new("notifications/ready", Some(json!({ "serverInfo": info })));

    match mode {
        HandshakeMode::None => Ok(Vec::new()),
        HandshakeMode::Single => Ok(vec![serde_json::to_string(&ready)?]),
        HandshakeMode::Full => {
            let status = JsonRpcNotification::new(
                "server/status",
                Some(json!({ "status": "ready", "name": info.name, "version": info.version })),
            );
            Ok(vec![READY_BANNER.to_string(), serde_json::to_string(&ready)?, serde_json::to_string(&status)?])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn info() -> MCPServerInfo {
        MCPServerInfo::new("maas-mcp", "0.3.0")
    }

    #[test]
    fn test_full_handshake() {
        let lines = sentinels(HandshakeMode::Full, &info()).unwrap();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], READY_BANNER);

        for line in &lines[1..] {
            let value: Value = serde_json::from_str(line).unwrap();
            assert_eq!(value["jsonrpc"], "2.0");
            assert!(value.get("id").is_none());
        }
    }

    #[test]
    fn test_single_handshake() {
        let lines = sentinels(HandshakeMode::Single, &info()).unwrap();
        assert_eq!(lines.len(), 1);
        let value: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(value["method"], "notifications/ready");
        assert_eq!(value["params"]["serverInfo"]["version"], "0.3.0");
    }

    #[test]
    fn test_no_handshake() {
        assert!(sentinels(HandshakeMode::None, &info()).unwrap().is_empty());
    }
}
