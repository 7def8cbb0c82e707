//! Security audit trail for spec §4.E's "Login, logout, refresh, revoke,
//! reuse-detection, and failed attempts are appended to an audit log with
//! IP, user-agent, timestamp". Emitted as a structured `tracing` event
//! under a fixed target so it can be routed to a dedicated sink
//! independently of ordinary request logs, without a bespoke table.

pub fn log(event: &str, user_id: Option<&str>, ip: Option<&str>, user_agent: Option<&str>) {
    tracing::info!(
        target: "eosin_auth::audit",
        event,
        user_id,
        ip,
        user_agent,
        "auth audit event"
    );
}
