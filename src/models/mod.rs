pub mod extracted;
pub mod invoice;
pub mod request;

pub use extracted::{Currency, ExtractedInvoiceData, ExtractedItem, EXTRACTION_CONFIDENCE};
pub use invoice::{
    parse_loose_date, Invoice, InvoiceItem, InvoiceStatus, InvoiceUpdate, InvoiceWithItems,
    NewInvoice, NewInvoiceItem,
};
pub use request::{
    ApproveRequest, DeleteResponse, InvoiceListResponse, ListQuery, Pagination, RejectRequest,
    UpdateInvoiceRequest, UpdateItemRequest, UploadResponse,
};
