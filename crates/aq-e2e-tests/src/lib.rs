//! Test-only crate; the integration tests live under `tests/`.
