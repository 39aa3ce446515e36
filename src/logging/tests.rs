// rr: remote task runner
//
// SPDX-License-Identifier: MIT

use super::{LogContext, LogLevel};

#[test]
fn test_log_context_clear_host() {
    let mut ctx = LogContext::with_task("deploy");
    ctx.set_host("web-1");

    let results: Vec<_> = [("with_host", ctx.prefix()), {
        ctx.clear_host();
        ("after_clear", ctx.prefix())
    }]
    .into_iter()
    .collect();

    insta::assert_yaml_snapshot!("log_context_clear_host", results);
    assert!(ctx.host().is_none(), "host should be None after clear_host");
}

#[test]
fn test_log_level_conversion() {
    let conversions = vec![
        ("from_int(0)", LogLevel::from_int(0)),
        ("from_int(3)", LogLevel::from_int(3)),
        ("from_int(5)", LogLevel::from_int(5)),
        ("from_int(100)", LogLevel::from_int(100)),
    ];
    insta::assert_debug_snapshot!(conversions);
}

#[test]
fn test_log_context_prefix() {
    let ctx_task_only = LogContext::with_task("deploy");
    let mut ctx_with_host = LogContext::with_task("deploy");
    ctx_with_host.set_host("web-1");
    let ctx_empty = LogContext::default();

    insta::assert_yaml_snapshot!(
        "prefixes",
        vec![
            ("task_only", ctx_task_only.prefix()),
            ("with_host", ctx_with_host.prefix()),
            ("empty", ctx_empty.prefix()),
        ]
    );
}
