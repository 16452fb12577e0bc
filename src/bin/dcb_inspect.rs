//! Prints a summary of a compiled module: header, procedures, and sysproc bindings.
//!
//! Usage: `dcb-inspect <module.dcb> [base-offset]`. Set `RUST_LOG=debug` to
//! follow the load phase by phase.

use std::error::Error;

use dcb_loader::prog::symbols::SysProcBinding;
use dcb_loader::{ModuleLoader, SysProcTable};
use tracing_subscriber::{EnvFilter, fmt};

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_target(false).init();
}

fn parse_offset(text: &str) -> Result<u64, Box<dyn Error>> {
    let parsed = match text.strip_prefix("0x") {
        Some(hex) => u64::from_str_radix(hex, 16)?,
        None => text.parse()?,
    };
    Ok(parsed)
}

fn main() -> Result<(), Box<dyn Error>> {
    init_logging();
    let mut args = std::env::args().skip(1);
    let Some(path) = args.next() else {
        return Err("usage: dcb-inspect <module.dcb> [base-offset]".into());
    };
    let base = args.next().map(|text| parse_offset(&text)).transpose()?.unwrap_or(0);

    let file = std::io::BufReader::new(std::fs::File::open(&path)?);
    let module = ModuleLoader::default().load(file, base, &SysProcTable::new())?;
    let header = module.header();

    println!("{path} @ {base:#x}");
    println!("  version      {:#06x}", header.version);
    println!("  globals      {} bytes, {} vars", module.global_size(), module.global_vars().len());
    println!("  locals       {} bytes, {} vars", module.local_size(), module.local_vars().len());
    println!("  strings      {}", module.strings().len());
    println!("  ids          {}", module.ids().len());
    println!("  varspaces    {}", module.varspaces().len());
    println!("  files        {}", module.files().len());
    println!("  imports      {}", module.imports().len());
    match module.entry_point() {
        Some(entry) => println!("  entry point  {} (#{})", entry.name, entry.index),
        None => println!("  entry point  none"),
    }

    println!("procedures ({}):", module.procedures().len());
    for proc in module.procedures() {
        let body = match &proc.code {
            Some(code) => format!("{} words", code.len()),
            None => "abstract".to_string(),
        };
        println!(
            "  #{:<4} {:<24} params={} private={} public={} {body}",
            proc.index,
            proc.name,
            proc.params,
            proc.private_size(),
            proc.public_size()
        );
    }

    println!("sysprocs ({}):", module.sysprocs().len());
    for reference in module.sysprocs() {
        let name = module.ids().name_for(reference.name_code);
        let binding = match reference.binding() {
            SysProcBinding::Bound(code) => format!("bound to {}", code.0),
            SysProcBinding::Unresolved => "unresolved".to_string(),
        };
        println!(
            "  {:<24} call={} kind={} sig={:?} {binding}",
            name,
            reference.call_code,
            reference.kind,
            String::from_utf8_lossy(&reference.signature)
        );
    }
    Ok(())
}
