//! The `clinops` binary.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

fn main() -> anyhow::Result<()> {
    clinops::cli::execute()
}
