//! `zace doctor` (§1.2): environment preflight, grounded in the
//! teacher's `doctor::run_doctor`. Reports LLM endpoint reachability,
//! `.zace/` writability, and whether the approval-rules and script
//! registry files parse, without failing the process on any one check.

use std::path::Path;

use anyhow::Result;

use zace_core::traits::{CallKind, ChatClient, ChatRequest};
use zace_core::types::{Message, Role};

pub async fn run(project_root: &Path, config: &zace_config::ZaceConfig, chat: &dyn ChatClient) -> Result<()> {
    println!("=== zace doctor ===");
    println!("Platform:     {} {}", std::env::consts::OS, std::env::consts::ARCH);
    println!("zace version: {}", env!("CARGO_PKG_VERSION"));
    println!("Project root: {}", project_root.display());
    println!();

    println!("=== LLM endpoint ===");
    println!("base_url: {}", config.llm.base_url);
    println!("model:    {}", config.llm.model);
    let probe = ChatRequest {
        messages: vec![Message::new(Role::User, "ping")],
        call_kind: Some(CallKind::Planner),
        response_format: None,
    };
    match chat.chat(probe).await {
        Ok(_) => println!("status:   reachable"),
        Err(err) => println!("status:   unreachable ({err})"),
    }
    println!();

    println!("=== Project state ===");
    let zace_dir = zace_config::paths::zace_dir(project_root);
    print_writability(&zace_dir);

    let rules_path = project_root.join(&config.approval.approval_rules_path);
    match zace_approval::load_approval_rules(&rules_path) {
        Ok(rules) => println!("approval rules:  ok ({} rule(s))", rules.len()),
        Err(err) => println!("approval rules:  {err}"),
    }

    match zace_scripts::load_registry(project_root) {
        Ok(scripts) => println!("script registry: ok ({} entries)", scripts.len()),
        Err(err) => println!("script registry: {err}"),
    }

    Ok(())
}

fn print_writability(zace_dir: &Path) {
    match std::fs::create_dir_all(zace_dir) {
        Ok(()) => println!(".zace dir:       writable ({})", zace_dir.display()),
        Err(err) => println!(".zace dir:       not writable ({err})"),
    }
}
