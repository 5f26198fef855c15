use crate::config::Config;
use crate::directory::JsonDirectory;
use crate::outbox::{ConfiguredNonce, OutboxMailer};
use anyhow::{anyhow, bail, Context, Result};
use certificate::{
    certificate_link, certificate_slug, AssertionProvider, CertificateGenerator, CertificateOutput,
    CertificateRenderer, CertificateRoute, CertificateStore, EmailEndpoint, FsImageLoader,
    SendCertificateRequest,
};
use clap::{Parser, Subcommand};
use serde_json::Value;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "certgen", version, about = "Render badge certificates over a PDF template")]
pub struct Args {
    /// Config JSON file
    #[arg(
        short = 'c',
        long = "config",
        env = "CERTGEN_CONFIG",
        default_value = "certgen.json",
        global = true
    )]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a member's certificate for a badge page
    Render {
        /// Member login
        #[arg(long)]
        member: String,

        /// Badge page slug
        #[arg(long)]
        badge: String,

        /// Store the certificate under the storage root
        #[arg(long)]
        save: bool,

        /// Output file. Defaults to stdout.
        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Render the certificate addressed by a URL path
    Route {
        /// Path such as `certificate/jane/first-aid/`
        path: String,

        #[arg(long)]
        save: bool,

        #[arg(short = 'o', long = "output")]
        output: Option<PathBuf>,
    },

    /// Print the URL of a member's certificate
    Link {
        #[arg(long)]
        member: String,

        #[arg(long)]
        badge: String,
    },

    /// Email a stored certificate on behalf of a member
    Send {
        /// Badge page id
        #[arg(long)]
        badge_page: u64,

        /// Recipient address
        #[arg(long)]
        to: String,

        /// Login of the member sending the certificate
        #[arg(long = "as")]
        as_member: String,

        /// Request nonce. Defaults to the configured one.
        #[arg(long)]
        nonce: Option<String>,
    },
}

/// Loaded configuration and stores
struct Workspace {
    config: Config,
    settings: Value,
    directory: JsonDirectory,
}

impl Workspace {
    fn load(args: &Args) -> Result<Self> {
        let config = Config::load(&args.config)?;
        let settings = config.load_settings()?;
        let directory = JsonDirectory::load(&config.directory)?;
        Ok(Self {
            config,
            settings,
            directory,
        })
    }

    fn generator(&self) -> CertificateGenerator<'_> {
        let images = match &self.config.images_dir {
            Some(dir) => FsImageLoader::with_base_dir(dir),
            None => FsImageLoader::new(),
        };
        let renderer =
            CertificateRenderer::new(Box::new(images)).with_fonts(self.config.fonts.clone());

        CertificateGenerator::new(
            &self.settings,
            &self.config.media,
            &self.directory,
            self.config.site.clone(),
            renderer,
            CertificateStore::new(&self.config.storage_root),
        )
    }
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let stdout = io::stdout();
    let mut out = stdout.lock();
    execute(args, &mut out)
}

/// Run a parsed command, writing results to `out`
pub fn execute(args: Args, out: &mut dyn Write) -> Result<()> {
    let workspace = Workspace::load(&args)?;

    match args.command {
        Command::Render {
            member,
            badge,
            save,
            output,
        } => {
            let route = CertificateRoute { member, badge };
            let certificate = workspace.generator().generate_for_route(&route, save)?;
            emit(certificate, output, out)
        }
        Command::Route { path, save, output } => {
            let slug = certificate_slug(&workspace.settings);
            let route = CertificateRoute::parse(&slug, &path)
                .ok_or_else(|| anyhow!("not a certificate path: {path}"))?;
            let certificate = workspace.generator().generate_for_route(&route, save)?;
            emit(certificate, output, out)
        }
        Command::Link { member, badge } => {
            let slug = certificate_slug(&workspace.settings);
            let link = certificate_link(&workspace.config.site.home_url, &slug, &member, &badge);
            writeln!(out, "{link}")?;
            Ok(())
        }
        Command::Send {
            badge_page,
            to,
            as_member,
            nonce,
        } => {
            let member = workspace
                .directory
                .user_by_login(&as_member)
                .ok_or_else(|| anyhow!("no member with login {as_member}"))?;
            let outbox = workspace
                .config
                .outbox
                .clone()
                .context("no outbox configured")?;

            let generator = workspace.generator();
            let nonces = ConfiguredNonce(workspace.config.nonce.clone());
            let mailer = OutboxMailer::new(outbox);
            let endpoint = EmailEndpoint::new(&generator, &nonces, &mailer);

            let request = SendCertificateRequest {
                badge_page,
                nonce: nonce.unwrap_or_else(|| workspace.config.nonce.clone()),
                to_email: to,
            };
            let response = endpoint.handle(&request, Some(&member));
            writeln!(out, "{}", serde_json::to_string(&response)?)?;

            if !response.success {
                bail!("certificate email not sent");
            }
            Ok(())
        }
    }
}

fn emit(certificate: CertificateOutput, output: Option<PathBuf>, out: &mut dyn Write) -> Result<()> {
    match (certificate, output) {
        (CertificateOutput::Stream(bytes), Some(path)) => {
            std::fs::write(&path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            tracing::info!(path = %path.display(), bytes = bytes.len(), "wrote certificate");
        }
        (CertificateOutput::Stream(bytes), None) => {
            out.write_all(&bytes)?;
            out.flush()?;
        }
        (CertificateOutput::Persisted(stored), Some(path)) => {
            std::fs::copy(&stored, &path)
                .with_context(|| format!("failed to copy to {}", path.display()))?;
            writeln!(out, "{}", stored.display())?;
        }
        (CertificateOutput::Persisted(stored), None) => {
            writeln!(out, "{}", stored.display())?;
        }
    }
    Ok(())
}
