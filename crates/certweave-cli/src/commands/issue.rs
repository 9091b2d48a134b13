use std::{fs, path::PathBuf};

use certweave_x509::{
    create_certificate, CertificateRequest, Ed25519Signer, IssuanceConfig, Parent,
};
use colored::Colorize;
use der::DecodePem;
use x509_cert::Certificate;

use super::{load_template, read_to_string};
use crate::error::{CliError, CliResult};

pub struct IssueArgs {
    pub csr: PathBuf,
    pub key: PathBuf,
    pub template: Option<PathBuf>,
    pub ca: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub out: Option<PathBuf>,
}

pub fn handle(args: IssueArgs) -> CliResult<()> {
    // status goes to stderr so the certificate can be piped from stdout
    eprintln!("{}", format!("Issuing certificate for: {}", args.csr.display()).cyan().bold());

    let config = match &args.config {
        Some(path) => IssuanceConfig::load(path)?,
        None => IssuanceConfig::default(),
    };

    let (csr, template) = load_template(&args.csr, args.template.as_deref())?;
    let unsigned = template.certificate()?;

    let signer = Ed25519Signer::from_pkcs8_pem(&read_to_string(&args.key)?, config.clone())?;

    let ca = match &args.ca {
        Some(path) => Some(
            Certificate::from_pem(read_to_string(path)?.as_bytes())
                .map_err(|e| CliError::InvalidInput(format!("CA certificate {}: {e}", path.display())))?,
        ),
        None => None,
    };
    let parent = match &ca {
        Some(ca) => Parent::Issuer(ca),
        None => Parent::SelfSigned,
    };

    let issued = create_certificate(unsigned, parent, csr.public_key(), &signer, &config)?;
    let pem = issued.to_pem();

    match &args.out {
        Some(path) => {
            fs::write(path, &pem)?;
            eprintln!("{} certificate written to: {}", "✓".green(), path.display());
        }
        None => print!("{pem}"),
    }

    let tbs = &issued.certificate.tbs_certificate;
    eprintln!("  subject: {}", tbs.subject);
    eprintln!("  issuer: {}", tbs.issuer);
    eprintln!("  serial: {}", hex::encode(tbs.serial_number.as_bytes()));
    eprintln!("  valid until: {}", tbs.validity.not_after);

    Ok(())
}
