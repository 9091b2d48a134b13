pub mod issue;
pub mod render;

use std::{fs, path::Path};

use certweave_x509::{Csr, Template};

use crate::error::{CliError, CliResult};

pub(crate) fn read_to_string(path: &Path) -> CliResult<String> {
    if !path.exists() {
        return Err(CliError::FileNotFound(path.display().to_string()));
    }
    Ok(fs::read_to_string(path)?)
}

/// Load the request and merge it with the optional template file.
pub(crate) fn load_template(csr: &Path, template: Option<&Path>) -> CliResult<(Csr, Template)> {
    let csr = Csr::from_pem(&read_to_string(csr)?)?;
    let bytes = template.map(read_to_string).transpose()?;
    let template = Template::from_request(&csr, bytes.as_deref().map(str::as_bytes))?;
    Ok((csr, template))
}
