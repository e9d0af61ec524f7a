//! Workbook IO adapters: `rust_xlsxwriter` on the way out, `calamine` on the
//! way back in.

pub mod excel_read;
pub mod excel_write;
