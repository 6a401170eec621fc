//! Client setup: CLI overrides on top of the loaded config, source selection.

use vouchervision_core::{Config, SourceSpec, VoucherError, VoucherVision};

use super::ProcessArgs;

/// Apply CLI overrides to the loaded configuration.
pub fn apply_overrides(config: &mut Config, args: &ProcessArgs) {
    if let Some(server) = &args.server {
        config.server.url = server.clone();
    }
    if let Some(timeout_ms) = args.timeout_ms {
        config.server.timeout_ms = timeout_ms;
    }
    if let Some(max_workers) = args.max_workers {
        config.processing.max_workers = max_workers;
    }

    if !args.engines.is_empty() {
        config.request.engines = args.engines.clone();
    }
    if let Some(prompt) = &args.prompt {
        config.request.prompt = prompt.clone();
    }
    if let Some(model) = &args.llm_model {
        config.request.llm_model = model.clone();
    }
    if args.ocr_only {
        config.request.ocr_only = true;
    }
    if args.upload_remote_images {
        config.request.upload_remote_images = true;
    }

    if let Some(mode) = args.auth_mode {
        config.auth.mode = mode.into();
    }

    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.clone();
    }
    if args.no_csv {
        config.output.save_to_csv = false;
    }
    if args.no_json {
        config.output.save_json = false;
    }
}

/// Build the source specification from `--image`, `--directory` and `--file-list`.
///
/// Mutual exclusion is checked by the enumerator, so conflicting flags are
/// passed through as given.
pub fn source_spec(args: &ProcessArgs) -> anyhow::Result<SourceSpec> {
    let mut spec = match &args.file_list {
        Some(path) => SourceSpec::file_list_from_path(path)?,
        None => SourceSpec::default(),
    };
    spec.image = args.image.clone();
    spec.directory = args.directory.clone();
    Ok(spec)
}

/// Assemble the client from config and CLI arguments.
pub fn setup_client(mut config: Config, args: &ProcessArgs) -> anyhow::Result<VoucherVision> {
    apply_overrides(&mut config, args);

    match VoucherVision::new(config, args.auth_token.clone()) {
        Ok(client) => Ok(client),
        Err(VoucherError::MissingCredential) => anyhow::bail!(
            "No credential supplied.\n\n  Hint: pass --auth-token, set VV_API_KEY, \
             or set auth.credential in `vouchervision config path`."
        ),
        Err(e) => Err(e.into()),
    }
}
