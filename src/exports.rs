//! Runtime resolution of the buffer-export entry points
//!
//! The four dmabuf-export functions are optional driver extensions and must
//! be looked up by name at runtime. Resolution is all-or-none: a driver
//! missing any one of them cannot export, and the whole set is treated as
//! unavailable. The set is re-resolved on every device switch since a new
//! device may ship different capabilities.

use std::ffi::c_void;
use std::mem;

use tracing::{debug, warn};

/// Resolves driver entry points by name. The production implementation is
/// backed by `eglGetProcAddress`; tests substitute a table lookup.
pub trait SymbolLookup {
    /// Null means the symbol is not provided by the driver.
    fn lookup(&self, name: &str) -> *const c_void;
}

// EGL_KHR_image_base / EGL_MESA_image_dma_buf_export signatures.
pub type PfnCreateImage = unsafe extern "C" fn(
    dpy: *mut c_void,
    ctx: *mut c_void,
    target: u32,
    buffer: *mut c_void,
    attribs: *const i32,
) -> *mut c_void;
pub type PfnDestroyImage = unsafe extern "C" fn(dpy: *mut c_void, image: *mut c_void) -> u32;
pub type PfnQueryImage = unsafe extern "C" fn(
    dpy: *mut c_void,
    image: *mut c_void,
    fourcc: *mut i32,
    nplanes: *mut i32,
    modifiers: *mut u64,
) -> u32;
pub type PfnExportImage = unsafe extern "C" fn(
    dpy: *mut c_void,
    image: *mut c_void,
    fds: *mut i32,
    strides: *mut i32,
    offsets: *mut i32,
) -> u32;

const CREATE_IMAGE: &str = "eglCreateImageKHR";
const DESTROY_IMAGE: &str = "eglDestroyImageKHR";
const QUERY_IMAGE: &str = "eglExportDMABUFImageQueryMESA";
const EXPORT_IMAGE: &str = "eglExportDMABUFImageMESA";

/// Capability record holding the resolved export entry points.
///
/// Constructed only through [`ExportFns::resolve`], so a value of this type
/// always carries the complete, callable set.
#[derive(Clone, Copy)]
pub struct ExportFns {
    pub create_image: PfnCreateImage,
    pub destroy_image: PfnDestroyImage,
    pub query_image: PfnQueryImage,
    pub export_image: PfnExportImage,
}

impl ExportFns {
    /// Resolve the full set, or `None` if any entry point is missing.
    pub fn resolve(lookup: &dyn SymbolLookup) -> Option<Self> {
        let create_image = lookup.lookup(CREATE_IMAGE);
        let destroy_image = lookup.lookup(DESTROY_IMAGE);
        let query_image = lookup.lookup(QUERY_IMAGE);
        let export_image = lookup.lookup(EXPORT_IMAGE);

        for (name, ptr) in [
            (CREATE_IMAGE, create_image),
            (DESTROY_IMAGE, destroy_image),
            (QUERY_IMAGE, query_image),
            (EXPORT_IMAGE, export_image),
        ] {
            if ptr.is_null() {
                warn!("{name} unresolved, buffer export disabled");
                return None;
            }
        }

        debug!("buffer-export entry points resolved");
        // Pointers are non-null and come from the driver's own lookup, so
        // reinterpreting them as the extension signatures is as sound as
        // the driver's extension registry.
        unsafe {
            Some(Self {
                create_image: mem::transmute::<*const c_void, PfnCreateImage>(create_image),
                destroy_image: mem::transmute::<*const c_void, PfnDestroyImage>(destroy_image),
                query_image: mem::transmute::<*const c_void, PfnQueryImage>(query_image),
                export_image: mem::transmute::<*const c_void, PfnExportImage>(export_image),
            })
        }
    }
}
