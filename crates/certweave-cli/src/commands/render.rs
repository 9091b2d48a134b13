use std::path::PathBuf;

use certweave_x509::UnsignedCertificate;
use colored::Colorize;

use super::load_template;
use crate::error::CliResult;

pub fn handle(csr: PathBuf, template: Option<PathBuf>) -> CliResult<()> {
    println!("{}", format!("Rendering request: {}", csr.display()).cyan().bold());
    if let Some(template) = &template {
        println!("  template: {}", template.display());
    }

    let (_, template) = load_template(&csr, template.as_deref())?;
    let cert = template.certificate()?;
    println!("{} request signature verified", "✓".green());
    println!();
    print_certificate(&cert);
    Ok(())
}

fn print_certificate(cert: &UnsignedCertificate) {
    println!("{}", "Certificate:".cyan());
    println!("  subject: {}", cert.subject);
    if !cert.issuer.is_empty() {
        println!("  issuer: {}", cert.issuer);
    }
    match &cert.serial_number {
        Some(serial) => println!("  serial: {serial:#x}"),
        None => println!("  serial: {}", "(generated at issuance)".dimmed()),
    }
    println!("  public key: {:?}", cert.public_key_algorithm);
    if let Some(algorithm) = cert.signature_algorithm {
        println!("  signature algorithm: {algorithm:?}");
    }

    let names = [
        ("dns", &cert.dns_names),
        ("email", &cert.email_addresses),
        ("uri", &cert.uris),
    ];
    for (kind, values) in names {
        for value in values {
            println!("  san {kind}: {value}");
        }
    }
    for ip in &cert.ip_addresses {
        println!("  san ip: {ip}");
    }

    println!("{}", "Extensions:".cyan());
    if let Some(usage) = cert.key_usage {
        println!("  key usage: {:#06x}", usage.bits());
    }
    if !cert.ext_key_usage.is_empty() || !cert.unknown_ext_key_usage.is_empty() {
        let mut usages: Vec<String> = cert.ext_key_usage.iter().map(|u| format!("{u:?}")).collect();
        usages.extend(cert.unknown_ext_key_usage.iter().map(ToString::to_string));
        println!("  extended key usage: {}", usages.join(", "));
    }
    if let Some(bc) = &cert.basic_constraints {
        println!("  basic constraints: ca={} max_path_len={}", bc.is_ca, bc.max_path_len);
    }
    if let Some(nc) = &cert.name_constraints {
        println!("  name constraints: critical={}", nc.critical);
    }
    if !cert.subject_key_id.is_empty() {
        println!("  subject key id: {}", hex::encode(&cert.subject_key_id));
    }
    if !cert.authority_key_id.is_empty() {
        println!("  authority key id: {}", hex::encode(&cert.authority_key_id));
    }
    for url in &cert.ocsp_server {
        println!("  ocsp: {url}");
    }
    for url in &cert.issuing_certificate_url {
        println!("  ca issuers: {url}");
    }
    for url in &cert.crl_distribution_points {
        println!("  crl: {url}");
    }
    for policy in &cert.policy_identifiers {
        println!("  policy: {policy}");
    }
    for ext in &cert.extra_extensions {
        println!(
            "  {} {} ({} bytes{})",
            "custom".yellow(),
            ext.id,
            ext.value.len(),
            if ext.critical { ", critical" } else { "" }
        );
    }
}
