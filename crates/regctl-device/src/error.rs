use std::io;

/// Fatal, device-server-level failures (spec §7: "Fatal conditions... cause
/// the server to fail to start and are reported through the log callback").
/// The device's per-command rejections (`forbidden`/`invalid`/`general`)
/// are not errors at this level: they are ordinary response frames produced
/// by the command interpreter.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    #[error("failed to bind listener: {0}")]
    BindFailed(#[source] io::Error),
    #[error("server task panicked or was cancelled")]
    TaskJoinFailed,
}
