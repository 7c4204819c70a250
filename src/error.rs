//! # Error Types Module
//!
//! Questo modulo definisce i tipi di errore custom della libreria.
//!
//! ## Responsabilità:
//! - Definisce `ConvertError` enum per categorizzare gli errori possibili
//! - Integra con `thiserror` per automatic error conversion
//! - Supporta error chaining per mantenere il contesto degli errori
//!
//! ## Categorie di errori:
//! - `Io`: Errori di I/O (sorgente illeggibile, directory mancante, etc.)
//! - `Image`: Il file prodotto non è riconoscibile come JPEG
//! - `ToolFailed`: Tutti i tool di conversione disponibili hanno fallito
//! - `MissingDependency`: Nessun tool esterno (sips, heif-convert, magick) trovato
//! - `UnsupportedFormat`: Estensione non HEIC/HEIF
//! - `Validation`: Errori di validazione configurazione
//! - `AlreadyRunning`: Una conversione batch è già in corso
//! - `WorkerStopped`: Il worker in background non risponde più
//!
//! ## Nota:
//! Gli errori per singolo file non arrivano mai al chiamante di `Converter::run`:
//! il driver li registra e marca l'item come `Failed`.

/// Custom error types for HEIC conversion
#[derive(thiserror::Error, Debug)]
pub enum ConvertError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Conversion tool error: {0}")]
    ToolFailed(String),

    #[error("Dependency missing: {0}")]
    MissingDependency(String),

    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),

    #[error("Configuration error: {0}")]
    Validation(String),

    #[error("A conversion batch is already running")]
    AlreadyRunning,

    #[error("Conversion worker has stopped")]
    WorkerStopped,
}

pub type Result<T> = std::result::Result<T, ConvertError>;
