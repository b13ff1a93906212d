// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Raw TCP print driver (JetDirect, port 9100).
//
// Opens a TCP socket and streams each document wrapped in a PJL job so the
// printer picks up paper size, duplex, resolution and copies. The printer
// must be able to interpret the document format natively.

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info, instrument};

use printdesk_core::error::{PrintDeskError, Result};
use printdesk_core::types::{ColorMode, DocumentType, DuplexMode, Orientation, PrintSettings};

use crate::driver::{PrintPayload, PrinterDriver, Progress};

/// Timeout for establishing the TCP connection.
const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Universal Exit Language; switches the printer back to PJL.
const UEL: &[u8] = b"\x1b%-12345X";

/// Write chunk size; progress is logged per chunk.
const CHUNK_SIZE: usize = 8192;

/// Build the PJL preamble for one document.
pub fn pjl_header(
    job_name: &str,
    settings: &PrintSettings,
    copies: u32,
    document_type: DocumentType,
) -> Vec<u8> {
    let mut pjl = String::new();
    // PJL strings cannot contain quotes.
    let name: String = job_name.chars().filter(|c| *c != '"').take(80).collect();

    pjl.push_str("@PJL\r\n");
    pjl.push_str(&format!("@PJL JOB NAME=\"{name}\"\r\n"));
    pjl.push_str(&format!("@PJL SET COPIES={}\r\n", copies.max(1)));
    pjl.push_str(&format!("@PJL SET PAPER={}\r\n", settings.paper_size.pjl_keyword()));
    pjl.push_str(&format!(
        "@PJL SET ORIENTATION={}\r\n",
        match settings.orientation {
            Orientation::Portrait => "PORTRAIT",
            Orientation::Landscape => "LANDSCAPE",
        }
    ));
    match settings.duplex {
        DuplexMode::None => pjl.push_str("@PJL SET DUPLEX=OFF\r\n"),
        DuplexMode::LongEdge => {
            pjl.push_str("@PJL SET DUPLEX=ON\r\n");
            pjl.push_str("@PJL SET BINDING=LONGEDGE\r\n");
        }
        DuplexMode::ShortEdge => {
            pjl.push_str("@PJL SET DUPLEX=ON\r\n");
            pjl.push_str("@PJL SET BINDING=SHORTEDGE\r\n");
        }
    }
    pjl.push_str(&format!(
        "@PJL SET RENDERMODE={}\r\n",
        match settings.color_mode {
            ColorMode::Color => "COLOR",
            ColorMode::Bw => "GRAYSCALE",
        }
    ));
    pjl.push_str(&format!(
        "@PJL SET RESOLUTION={}\r\n",
        settings.quality.resolution_dpi()
    ));
    if document_type == DocumentType::Pdf {
        pjl.push_str("@PJL ENTER LANGUAGE=PDF\r\n");
    }

    let mut out = UEL.to_vec();
    out.extend_from_slice(pjl.as_bytes());
    out
}

/// PJL trailer closing a job opened by [`pjl_header`].
pub fn pjl_trailer() -> Vec<u8> {
    let mut out = UEL.to_vec();
    out.extend_from_slice(b"@PJL EOJ\r\n");
    out.extend_from_slice(UEL);
    out
}

/// Send bytes to a printer via raw TCP.
#[instrument(skip(data), fields(bytes = data.len()))]
pub async fn send_raw(host: &str, port: u16, data: &[u8]) -> Result<()> {
    let addr = format!("{}:{}", host, port);
    info!(addr = %addr, total = data.len(), "connecting via raw TCP");

    let mut stream = tokio::time::timeout(
        Duration::from_secs(CONNECT_TIMEOUT_SECS),
        TcpStream::connect(&addr),
    )
    .await
    .map_err(|_| {
        PrintDeskError::Printer(format!(
            "raw TCP connection to {} timed out after {}s",
            addr, CONNECT_TIMEOUT_SECS
        ))
    })?
    .map_err(|e| PrintDeskError::Printer(format!("raw TCP connect to {}: {}", addr, e)))?;

    let mut sent = 0usize;
    for chunk in data.chunks(CHUNK_SIZE) {
        stream.write_all(chunk).await.map_err(|e| {
            PrintDeskError::Printer(format!("raw TCP send failed at byte {}: {}", sent, e))
        })?;
        sent += chunk.len();
        debug!(sent, total = data.len(), "raw TCP progress");
    }

    stream
        .flush()
        .await
        .map_err(|e| PrintDeskError::Printer(format!("raw TCP flush: {e}")))?;
    stream
        .shutdown()
        .await
        .map_err(|e| PrintDeskError::Printer(format!("raw TCP shutdown: {e}")))?;

    info!(total = data.len(), "raw TCP transfer complete");
    Ok(())
}

/// Driver for JetDirect printers.
#[derive(Debug, Clone)]
pub struct RawDriver {
    host: String,
    port: u16,
}

impl RawDriver {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl PrinterDriver for RawDriver {
    fn kind(&self) -> &'static str {
        "raw"
    }

    /// One connection per document; progress advances a whole document at a
    /// time since the protocol gives no page feedback.
    async fn deliver(&self, payload: &PrintPayload, progress: &Progress) -> Result<()> {
        let mut printed = 0u64;
        for document in &payload.documents {
            let mut data = pjl_header(
                &document.file.name,
                &payload.settings,
                document.file.copies,
                document.file.document_type,
            );
            data.extend_from_slice(&document.content);
            data.extend_from_slice(&pjl_trailer());

            send_raw(&self.host, self.port, &data).await?;
            printed += document.file.printed_pages();
            progress.pages_printed(printed);
        }
        Ok(())
    }
}
