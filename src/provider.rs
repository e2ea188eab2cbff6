//! Execution providers: which ONNX Runtime backend runs a session.

use std::fmt;
use std::str::FromStr;

use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, ExecutionProviderDispatch,
};
use ort::session::Session;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionProvider {
    Cuda(usize),
    Cpu,
}

impl ExecutionProvider {
    /// Registration for the session builder. A provider that cannot be
    /// registered fails the build instead of being skipped silently.
    pub fn dispatch(&self) -> ExecutionProviderDispatch {
        match self {
            ExecutionProvider::Cuda(ordinal) => CUDAExecutionProvider::default()
                .with_device_id(*ordinal as i32)
                .build()
                .error_on_failure(),
            ExecutionProvider::Cpu => CPUExecutionProvider::default().build().error_on_failure(),
        }
    }

    /// Default preference order: the first GPU, then the CPU.
    pub fn defaults() -> Vec<Self> {
        vec![ExecutionProvider::Cuda(0), ExecutionProvider::Cpu]
    }
}

impl fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionProvider::Cuda(ordinal) => write!(f, "cuda:{ordinal}"),
            ExecutionProvider::Cpu => f.write_str("cpu"),
        }
    }
}

impl FromStr for ExecutionProvider {
    type Err = String;

    /// Accepts `cpu`, `cuda` and `cuda:N`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "cpu" => Ok(ExecutionProvider::Cpu),
            "cuda" => Ok(ExecutionProvider::Cuda(0)),
            other => other
                .strip_prefix("cuda:")
                .and_then(|id| id.parse().ok())
                .map(ExecutionProvider::Cuda)
                .ok_or_else(|| format!("unknown execution provider '{other}'")),
        }
    }
}

/// Builds a session for `model` on the first provider in `providers` that
/// accepts it.
pub fn open_session(
    providers: &[ExecutionProvider],
    model: &[u8],
) -> Result<(ExecutionProvider, Session)> {
    for provider in providers {
        tracing::debug!("Trying execution provider: {}", provider);
        let attempt = Session::builder()
            .and_then(|builder| builder.with_execution_providers([provider.dispatch()]))
            .and_then(|builder| builder.commit_from_memory(model));
        match attempt {
            Ok(session) => {
                tracing::debug!("Using execution provider: {}", provider);
                return Ok((*provider, session));
            }
            Err(e) => {
                tracing::debug!("Execution provider {} not available: {}", provider, e);
            }
        }
    }
    Err(Error::NoExecutionProvider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{ExportOptions, build_model};
    use crate::proto::Message;
    use crate::scale::Scale;

    #[test]
    fn test_parse_providers() {
        assert_eq!("cpu".parse::<ExecutionProvider>(), Ok(ExecutionProvider::Cpu));
        assert_eq!("cuda".parse::<ExecutionProvider>(), Ok(ExecutionProvider::Cuda(0)));
        assert_eq!("cuda:2".parse::<ExecutionProvider>(), Ok(ExecutionProvider::Cuda(2)));
        assert!("cuda:x".parse::<ExecutionProvider>().is_err());
        assert!("webgpu".parse::<ExecutionProvider>().is_err());
        assert_eq!(ExecutionProvider::Cuda(1).to_string(), "cuda:1");
    }

    fn doubling_bytes() -> Vec<u8> {
        let options = ExportOptions::default();
        build_model(&Scale::doubling(), &options)
            .unwrap()
            .encode_to_vec()
    }

    #[test]
    fn test_cpu_fallback() {
        let (provider, _) = open_session(&ExecutionProvider::defaults(), &doubling_bytes()).unwrap();
        if cfg!(feature = "cuda") {
            assert!(matches!(provider, ExecutionProvider::Cuda(0) | ExecutionProvider::Cpu));
        } else {
            assert_eq!(provider, ExecutionProvider::Cpu);
        }
    }

    #[test]
    fn test_empty_provider_list() {
        assert!(matches!(
            open_session(&[], &doubling_bytes()),
            Err(Error::NoExecutionProvider)
        ));
    }
}
