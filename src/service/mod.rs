pub mod extractor;
pub mod invoices;
pub mod ocr;
pub mod storage;
pub mod validation;

pub use extractor::extract;
pub use invoices::InvoiceService;
pub use ocr::{OcrEngine, TesseractCli};
pub use storage::FileStore;
