pub mod archive;
pub mod pdf;
pub mod raster;

pub use archive::{collect_pdfs, PdfUpload, UploadedFile};
pub use pdf::{PageRenderer, PdftoppmRenderer, RenderedPage};
