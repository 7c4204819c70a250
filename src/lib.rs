//! # HEIC Converter Library
//!
//! Questo è il modulo principale della libreria che espone tutte le API pubbliche.
//!
//! ## Responsabilità:
//! - Definisce la struttura modulare dell'applicazione
//! - Espone i tipi e le funzioni principali tramite re-exports
//! - Fornisce un'interfaccia pulita per il main.rs e per altri front-end
//!
//! ## Architettura dei moduli:
//! - `config`: Gestione configurazione e validazione parametri
//! - `error`: Tipi di errore custom
//! - `file_manager`: Riconoscimento HEIC, discovery cartelle, path di output
//! - `queue`: Coda ordinata e senza duplicati con stato per file
//! - `codec`: Servizio di conversione HEIC → JPEG tramite tool esterni
//! - `tool_resolver`: Ricerca dei tool nel sistema o in una directory dedicata
//! - `driver`: Worker in background che converte un batch in sequenza
//! - `converter`: Coordinatore che possiede lo stato e applica gli eventi
//! - `progress`: Progress bar e statistiche
//! - `json_output`: Eventi JSON per front-end esterni

pub mod codec;
pub mod config;
pub mod converter;
pub mod driver;
pub mod error;
pub mod file_manager;
pub mod json_output;
pub mod progress;
pub mod queue;
pub mod tool_resolver;

pub use codec::{ExternalToolCodec, ImageCodec, JPEG_QUALITY};
pub use config::Config;
pub use converter::{Converter, StateSnapshot};
pub use error::ConvertError;
pub use progress::ConversionStats;
pub use queue::{FileQueue, ItemStatus, QueueItem};
