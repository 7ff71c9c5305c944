//! Pixelfx CLI - apply a filter to an image file.

use pixelfx::prelude::*;
use std::path::Path;
use std::process::ExitCode;

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();
    let program = args.first().map(String::as_str).unwrap_or("pixelfx");

    if args.len() < 2 {
        print_usage(program);
        return ExitCode::FAILURE;
    }

    let result = match args[1].as_str() {
        "list" => {
            list_filters();
            Ok(())
        }
        "info" => match args.get(2) {
            Some(id) => filter_info(id),
            None => Err("Please specify a filter ID".to_string()),
        },
        "process" => {
            if args.len() < 5 {
                eprintln!(
                    "Usage: {} process <input> <output> <filter> [key=value ...] [--threads N] [--config file.toml] [--action-out file.json]",
                    program
                );
                return ExitCode::FAILURE;
            }
            process_image(&args[2..])
        }
        "replay" => {
            if args.len() < 5 {
                eprintln!("Usage: {} replay <input> <output> <action.json>", program);
                return ExitCode::FAILURE;
            }
            replay_action(&args[2], &args[3], &args[4])
        }
        "help" | "--help" | "-h" => {
            print_usage(program);
            Ok(())
        }
        other => Err(format!("Unknown command: {}", other)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("Error: {}", message);
            ExitCode::FAILURE
        }
    }
}

fn print_usage(program: &str) {
    println!("Pixelfx v{}", pixelfx::VERSION);
    println!();
    println!("Usage: {} <command> [options]", program);
    println!();
    println!("Commands:");
    println!("  list                                  List all available filters");
    println!("  info <filter>                         Show parameters of a filter");
    println!("  process <in> <out> <filter> [opts]    Apply a filter to an image");
    println!("  replay <in> <out> <action.json>       Re-run a recorded filter action");
    println!("  help                                  Show this help message");
    println!();
    println!("Process options:");
    println!("  key=value             Set a filter parameter (see 'info')");
    println!("  --threads <n>         Worker threads (0 = all cores)");
    println!("  --config <file>       Engine settings in TOML");
    println!("  --action-out <file>   Write the realized action as JSON");
}

fn list_filters() {
    let registry = FilterRegistry::with_builtins();
    let grouped = registry.grouped_by_category();

    println!("Available filters ({} total):", registry.len());
    println!();

    for (category, filters) in grouped {
        println!("  {:?}", category);
        for metadata in filters {
            println!("      {} - {}", metadata.id, metadata.description);
        }
        println!();
    }
}

fn filter_info(filter_id: &str) -> Result<(), String> {
    let registry = FilterRegistry::with_builtins();
    let metadata = registry
        .get_metadata(filter_id)
        .ok_or_else(|| format!("Filter not found: {} (use 'list' to see available filters)", filter_id))?;

    println!("Filter: {}", metadata.name);
    println!("ID: {}", metadata.id);
    println!("Category: {:?}", metadata.category);
    println!("Version: {}", metadata.version);
    if metadata.randomized {
        println!("Randomized: records '{}'", SEED_PARAMETER);
    }
    println!();
    println!("Description:");
    println!("  {}", metadata.description);
    println!();

    if !metadata.parameters.is_empty() {
        println!("Parameters:");
        for param in &metadata.parameters {
            println!(
                "  {} [{}] = {}",
                param.name,
                param.default_value.type_name(),
                param.default_value
            );
            if !param.description.is_empty() {
                println!("    {}", param.description);
            }
            for constraint in &param.constraints {
                println!("    {:?}", constraint);
            }
        }
    }
    Ok(())
}

/// Parse `text` as a value of the same kind as `template`.
fn parse_value(template: &ParamValue, text: &str) -> Option<ParamValue> {
    match template {
        ParamValue::Integer(_) => text.parse().ok().map(ParamValue::Integer),
        ParamValue::Float(_) => text.parse().ok().map(ParamValue::Float),
        ParamValue::Boolean(_) => text.parse().ok().map(ParamValue::Boolean),
        ParamValue::Text(_) => Some(ParamValue::Text(text.to_string())),
        ParamValue::FloatList(_) => text
            .split(',')
            .map(|v| v.trim().parse::<f64>())
            .collect::<Result<Vec<_>, _>>()
            .ok()
            .map(ParamValue::FloatList),
    }
}

fn process_image(args: &[String]) -> Result<(), String> {
    let input_path = &args[0];
    let output_path = &args[1];
    let filter_id = &args[2];

    let registry = FilterRegistry::with_builtins();
    let metadata = registry
        .get_metadata(filter_id)
        .ok_or_else(|| format!("Filter not found: {}", filter_id))?;

    let mut action = FilterAction::new(&metadata.id, metadata.version);
    let mut config = EngineConfig::new();
    let mut threads: Option<usize> = None;
    let mut action_out: Option<&str> = None;

    let mut i = 3;
    while i < args.len() {
        match args[i].as_str() {
            "--threads" if i + 1 < args.len() => {
                threads = Some(
                    args[i + 1]
                        .parse()
                        .map_err(|_| format!("Invalid thread count: {}", args[i + 1]))?,
                );
                i += 2;
            }
            "--config" if i + 1 < args.len() => {
                config = EngineConfig::load(&args[i + 1]).map_err(|e| e.to_string())?;
                i += 2;
            }
            "--action-out" if i + 1 < args.len() => {
                action_out = Some(&args[i + 1]);
                i += 2;
            }
            arg => {
                let (key, text) = arg
                    .split_once('=')
                    .ok_or_else(|| format!("Unknown option: {}", arg))?;
                let param = metadata
                    .parameters
                    .iter()
                    .find(|p| p.name == key)
                    .ok_or_else(|| format!("Filter '{}' has no parameter '{}'", filter_id, key))?;
                let value = parse_value(&param.default_value, text).ok_or_else(|| {
                    format!("Parameter '{}' expects a {} value", key, param.default_value.type_name())
                })?;
                action.add_parameter(key, value);
                i += 1;
            }
        }
    }

    if let Some(threads) = threads {
        config = config.with_max_threads(threads);
    }

    let filter = registry.create(&action).map_err(describe_config_error)?;
    run_filter(&filter, input_path, output_path, config)?;

    if let Some(path) = action_out {
        let json = filter.filter_action().to_json().map_err(|e| e.to_string())?;
        std::fs::write(path, json).map_err(|e| format!("Cannot write {}: {}", path, e))?;
        println!("Action written to: {}", path);
    }
    Ok(())
}

fn replay_action(input_path: &str, output_path: &str, action_path: &str) -> Result<(), String> {
    let json = std::fs::read_to_string(action_path)
        .map_err(|e| format!("Cannot read {}: {}", action_path, e))?;
    let action = FilterAction::from_json(&json).map_err(|e| e.to_string())?;
    let filter = Filter::from_action(&action).map_err(describe_config_error)?;
    run_filter(&filter, input_path, output_path, EngineConfig::new())
}

fn run_filter(filter: &Filter, input_path: &str, output_path: &str, config: EngineConfig) -> Result<(), String> {
    let image = image::open(Path::new(input_path)).map_err(|e| format!("Cannot open {}: {}", input_path, e))?;
    let source = PixelBuffer::from_dynamic_image(&image).map_err(|e| e.to_string())?;
    let mut dest = PixelBuffer::new_like(&source).map_err(|e| e.to_string())?;

    let engine = FilterEngine::with_config(config).map_err(|e| e.to_string())?;
    let ctx = FilterContext::new(&engine).with_progress(|percent| println!("   {:>3}%", percent));

    println!(
        "Processing {} -> {} with '{}' on {} threads",
        input_path,
        output_path,
        filter.id(),
        engine.worker_count()
    );

    let status = filter.apply(&source, &mut dest, &ctx).map_err(|e| match e {
        FilterError::Configuration(err) => describe_config_error(err),
        other => other.to_string(),
    })?;

    if status.is_cancelled() {
        return Err("Filter run was cancelled, no output written".to_string());
    }

    dest.to_dynamic_image()
        .map_err(|e| e.to_string())?
        .save(output_path)
        .map_err(|e| format!("Cannot save {}: {}", output_path, e))?;
    println!("Image saved to: {}", output_path);
    Ok(())
}

fn describe_config_error(err: ConfigurationError) -> String {
    match err.suggested_fix() {
        Some(fix) => format!("{}\n  hint: {}", err, fix),
        None => err.to_string(),
    }
}
