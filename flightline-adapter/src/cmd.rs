//! Command-line argument construction for tool invocations.

use crate::types::{InvocationRequest, ToolConfig};
use std::ffi::OsString;

/// Builds the argument list for one tool invocation.
///
/// The order is fixed: input, output, resolution, palette, then the
/// verbosity flag. The executable path itself is not part of the list.
#[must_use]
pub fn build_args(request: &InvocationRequest, config: &ToolConfig) -> Vec<OsString> {
    let mut args = Vec::new();

    let mut input = OsString::from("-i=");
    input.push(&request.input);
    args.push(input);

    let mut output = OsString::from("-o=");
    output.push(&request.output);
    args.push(output);

    args.push(OsString::from(format!(
        "-resolution={}",
        request.resolution
    )));

    args.push(OsString::from(format!("-palette={}", config.palette)));

    if config.verbose {
        args.push(OsString::from("-v"));
    }

    args
}
