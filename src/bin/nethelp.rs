#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! CLI for quick network checks: banners, HTTP status, mail, public IP

use clap::{Parser, Subcommand};
use net_helpers::{EmailMessage, HttpOptions, SmtpOptions, TcpOptions, VerifyMode};
use net_helpers::{external_ip, http, smtp, tcp};
use serde_json::json;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "nethelp")]
#[command(about = "Quick TCP, HTTP and SMTP checks")]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Print the first line a TCP server sends
    Banner {
        host: String,
        port: u16,
    },

    /// Print the HTTP status code of a URL
    Status {
        url: String,

        /// Method to use instead of HEAD
        #[arg(long)]
        method: Option<String>,

        /// TLS verification mode (none, peer, client_once, fail_if_no_peer_cert)
        #[arg(long)]
        verify: Option<VerifyMode>,
    },

    /// Print the response headers of a GET
    Headers {
        url: String,
    },

    /// Print the response body of a GET
    Get {
        url: String,
    },

    /// Print this host's public IPv4 address
    Ip {
        /// checkip-style page to query
        #[arg(long, default_value = external_ip::CHECKIP_URL)]
        url: String,
    },

    /// Send a plain-text email (server settings come from SMTP_* env vars)
    Send {
        #[arg(long)]
        from: String,

        #[arg(long, required = true)]
        to: Vec<String>,

        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long, default_value = "")]
        body: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match &args.command {
        Command::Banner { host, port } => {
            let line = tcp::banner(&TcpOptions::new(host.as_str(), *port)).await?;
            print_value(&args, "banner", &line);
        }
        Command::Status {
            url,
            method,
            verify,
        } => {
            let options = HttpOptions {
                method: method.clone(),
                verify: *verify,
                ..HttpOptions::url(url.as_str())
            };
            let code = http::status(&options).await?;
            if args.json {
                println!("{}", json!({ "status": code, "ok": code == 200 }));
            } else {
                println!("{code}");
            }
        }
        Command::Headers { url } => {
            let headers = http::get_headers(&HttpOptions::url(url.as_str())).await?;
            let pairs: Vec<(String, String)> = headers
                .iter()
                .map(|(name, value)| {
                    (
                        name.to_string(),
                        String::from_utf8_lossy(value.as_bytes()).into_owned(),
                    )
                })
                .collect();
            if args.json {
                println!("{}", serde_json::to_string_pretty(&pairs)?);
            } else {
                for (name, value) in &pairs {
                    println!("{name}: {value}");
                }
            }
        }
        Command::Get { url } => {
            let body = http::get_body(&HttpOptions::url(url.as_str())).await?;
            print_value(&args, "body", &body);
        }
        Command::Ip { url } => {
            let address = external_ip::current_ip_from(url).await?;
            match (&address, args.json) {
                (_, true) => println!("{}", json!({ "ip": address })),
                (Some(ip), false) => println!("{ip}"),
                (None, false) => anyhow::bail!("No IPv4 address found at {url}"),
            }
        }
        Command::Send {
            from,
            to,
            subject,
            body,
        } => {
            let (host, options) = SmtpOptions::from_env()?;
            let message = EmailMessage::new(from.as_str(), to.iter().map(String::as_str));
            let reply = smtp::send_message(&host, &options, message, |m| {
                m.subject.clone_from(subject);
                m.body.clone_from(body);
            })
            .await?;
            print_value(&args, "reply", &reply);
        }
    }

    Ok(())
}

fn print_value(args: &Args, key: &str, value: &str) {
    if args.json {
        let mut object = serde_json::Map::new();
        object.insert(key.to_string(), json!(value));
        println!("{}", serde_json::Value::Object(object));
    } else {
        println!("{value}");
    }
}
