//! Module ABI
//!
//! The `#[repr(C)]` symbol table a module exports so the host can locate its
//! types, methods and calling signatures without runtime reflection.
//!
//! A module is a `cdylib` that exports exactly one data symbol,
//! [`MODULE_SYMBOL`], holding a [`ModuleDecl`]:
//!
//! ```rust,ignore
//! use modhost::abi::{MethodDecl, ModuleDecl, SignatureDecl, TypeCode, TypeDecl};
//!
//! extern "C" fn add(a: i32, b: i32) -> i32 {
//!     a + b
//! }
//!
//! fn add_f(a: f32, b: f32) -> f32 {
//!     a + b
//! }
//!
//! modhost::extern_shim!(fn add_f_shim(a: f32, b: f32) -> f32 => add_f);
//!
//! static CALCULATOR: [MethodDecl; 2] = [
//!     MethodDecl::boundary("Add", add as *const _, &[TypeCode::I32, TypeCode::I32], TypeCode::I32),
//!     MethodDecl::managed(
//!         "AddF",
//!         add_f as *const _,
//!         add_f_shim as *const _,
//!         &[TypeCode::F32, TypeCode::F32],
//!         TypeCode::F32,
//!     ),
//! ];
//!
//! modhost::declare_module!(ModuleDecl::new(
//!     "MathOps",
//!     &[TypeDecl::new("Calculator", &CALCULATOR)],
//!     &[SignatureDecl::new("FloatAddDelegate", &[TypeCode::F32, TypeCode::F32], TypeCode::F32)],
//! ));
//! ```
//!
//! Everything here is plain data. Decoding and validation happen once, at
//! load time, in [`crate::module::LoadedModule::decode`].

use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::ops::BitOr;

/// Version of the declaration layout. Bumped on any layout change.
pub const ABI_VERSION: u32 = 1;

/// Name of the data symbol every module exports (NUL-terminated).
pub const MODULE_SYMBOL: &[u8] = b"MODHOST_MODULE\0";

/// Borrowed UTF-8 string with a C layout
#[repr(C)]
#[derive(Clone, Copy)]
pub struct StrRef {
    ptr: *const u8,
    len: usize,
}

impl StrRef {
    pub const fn new(s: &'static str) -> Self {
        Self {
            ptr: s.as_ptr(),
            len: s.len(),
        }
    }

    pub const fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.ptr.is_null()
    }

    /// View the referenced bytes as UTF-8.
    ///
    /// # Safety
    ///
    /// `ptr`/`len` must describe memory that stays mapped for `'a`. For
    /// declarations read out of a shared library this means the library
    /// must not be closed while the returned `&str` is alive.
    pub unsafe fn to_str<'a>(&self) -> Result<&'a str, std::str::Utf8Error> {
        if self.is_empty() {
            return Ok("");
        }
        std::str::from_utf8(std::slice::from_raw_parts(self.ptr, self.len))
    }
}

unsafe impl Send for StrRef {}
unsafe impl Sync for StrRef {}

impl fmt::Debug for StrRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Safety: StrRef values are only built from 'static strings or read
        // from a mapped module declaration.
        match unsafe { self.to_str() } {
            Ok(s) => write!(f, "{:?}", s),
            Err(_) => write!(f, "<invalid utf-8 ({} bytes)>", self.len),
        }
    }
}

/// Borrowed slice with a C layout
#[repr(C)]
pub struct SliceRef<T: 'static> {
    ptr: *const T,
    len: usize,
    _marker: PhantomData<&'static T>,
}

impl<T: 'static> SliceRef<T> {
    pub const fn new(items: &'static [T]) -> Self {
        Self {
            ptr: items.as_ptr(),
            len: items.len(),
            _marker: PhantomData,
        }
    }

    pub const fn empty() -> Self {
        Self {
            ptr: std::ptr::null(),
            len: 0,
            _marker: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0 || self.ptr.is_null()
    }

    /// # Safety
    ///
    /// Same contract as [`StrRef::to_str`].
    pub unsafe fn as_slice<'a>(&self) -> &'a [T] {
        if self.is_empty() {
            return &[];
        }
        std::slice::from_raw_parts(self.ptr, self.len)
    }
}

impl<T: 'static> Clone for SliceRef<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for SliceRef<T> {}

impl<T: fmt::Debug + 'static> fmt::Debug for SliceRef<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Safety: see StrRef's Debug impl.
        f.debug_list()
            .entries(unsafe { self.as_slice() }.iter())
            .finish()
    }
}

unsafe impl<T: Sync + 'static> Send for SliceRef<T> {}
unsafe impl<T: Sync + 'static> Sync for SliceRef<T> {}

/// Wire code for a parameter or return type
///
/// Kept as a transparent `u8` rather than an enum so that a module built
/// against a newer layout can never hand the host an invalid discriminant.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeCode(pub u8);

impl TypeCode {
    pub const VOID: TypeCode = TypeCode(0);
    pub const BOOL: TypeCode = TypeCode(1);
    pub const I8: TypeCode = TypeCode(2);
    pub const I16: TypeCode = TypeCode(3);
    pub const I32: TypeCode = TypeCode(4);
    pub const I64: TypeCode = TypeCode(5);
    pub const U8: TypeCode = TypeCode(6);
    pub const U16: TypeCode = TypeCode(7);
    pub const U32: TypeCode = TypeCode(8);
    pub const U64: TypeCode = TypeCode(9);
    pub const F32: TypeCode = TypeCode(10);
    pub const F64: TypeCode = TypeCode(11);
    pub const PTR: TypeCode = TypeCode(12);
    pub const CSTR: TypeCode = TypeCode(13);
}

/// Visibility and calling-convention flags of a method
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct MethodFlags(pub u32);

impl MethodFlags {
    pub const NONE: MethodFlags = MethodFlags(0);
    pub const PUBLIC: MethodFlags = MethodFlags(1 << 0);
    pub const STATIC: MethodFlags = MethodFlags(1 << 1);
    /// Boundary-callable marker: the entry point is a plain `extern "C"`
    /// function and may be handed to foreign callers as-is.
    pub const BOUNDARY: MethodFlags = MethodFlags(1 << 2);

    pub const fn union(self, other: MethodFlags) -> MethodFlags {
        MethodFlags(self.0 | other.0)
    }

    pub const fn contains(self, other: MethodFlags) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for MethodFlags {
    type Output = MethodFlags;

    fn bitor(self, rhs: MethodFlags) -> MethodFlags {
        self.union(rhs)
    }
}

/// One method of a declared type
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct MethodDecl {
    pub name: StrRef,
    pub flags: MethodFlags,
    /// Entry point. `extern "C"` when `BOUNDARY` is set, Rust ABI otherwise.
    pub address: *const c_void,
    /// Build-time generated `extern "C"` wrapper for non-boundary methods,
    /// or null.
    pub shim: *const c_void,
    pub params: SliceRef<TypeCode>,
    pub ret: TypeCode,
}

impl MethodDecl {
    /// A public static method carrying the boundary-callable marker.
    pub const fn boundary(
        name: &'static str,
        address: *const c_void,
        params: &'static [TypeCode],
        ret: TypeCode,
    ) -> Self {
        Self {
            name: StrRef::new(name),
            flags: MethodFlags::PUBLIC
                .union(MethodFlags::STATIC)
                .union(MethodFlags::BOUNDARY),
            address,
            shim: std::ptr::null(),
            params: SliceRef::new(params),
            ret,
        }
    }

    /// A public static Rust-ABI method, optionally with its generated shim.
    pub const fn managed(
        name: &'static str,
        address: *const c_void,
        shim: *const c_void,
        params: &'static [TypeCode],
        ret: TypeCode,
    ) -> Self {
        Self {
            name: StrRef::new(name),
            flags: MethodFlags::PUBLIC.union(MethodFlags::STATIC),
            address,
            shim,
            params: SliceRef::new(params),
            ret,
        }
    }

    pub const fn with_flags(mut self, flags: MethodFlags) -> Self {
        self.flags = flags;
        self
    }
}

unsafe impl Send for MethodDecl {}
unsafe impl Sync for MethodDecl {}

/// A declared type and its methods
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct TypeDecl {
    pub name: StrRef,
    pub methods: SliceRef<MethodDecl>,
}

impl TypeDecl {
    pub const fn new(name: &'static str, methods: &'static [MethodDecl]) -> Self {
        Self {
            name: StrRef::new(name),
            methods: SliceRef::new(methods),
        }
    }
}

/// A named calling signature (parameter and return shape)
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct SignatureDecl {
    pub name: StrRef,
    pub params: SliceRef<TypeCode>,
    pub ret: TypeCode,
}

impl SignatureDecl {
    pub const fn new(name: &'static str, params: &'static [TypeCode], ret: TypeCode) -> Self {
        Self {
            name: StrRef::new(name),
            params: SliceRef::new(params),
            ret,
        }
    }
}

/// Root declaration exported under [`MODULE_SYMBOL`]
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct ModuleDecl {
    pub abi_version: u32,
    /// Canonical module name; this, not the file name, is the registry key.
    pub name: StrRef,
    pub types: SliceRef<TypeDecl>,
    pub signatures: SliceRef<SignatureDecl>,
}

impl ModuleDecl {
    pub const fn new(
        name: &'static str,
        types: &'static [TypeDecl],
        signatures: &'static [SignatureDecl],
    ) -> Self {
        Self {
            abi_version: ABI_VERSION,
            name: StrRef::new(name),
            types: SliceRef::new(types),
            signatures: SliceRef::new(signatures),
        }
    }
}

/// Export a [`ModuleDecl`] under the well-known symbol name.
#[macro_export]
macro_rules! declare_module {
    ($decl:expr) => {
        #[no_mangle]
        pub static MODHOST_MODULE: $crate::abi::ModuleDecl = $decl;
    };
}

/// Generate an `extern "C"` shim that forwards to a Rust-ABI function.
///
/// The shim is what the host hands out when a caller binds a non-boundary
/// method to an explicit calling signature.
#[macro_export]
macro_rules! extern_shim {
    ($vis:vis fn $shim:ident ( $($arg:ident : $ty:ty),* $(,)? ) -> $ret:ty => $target:path) => {
        $vis extern "C" fn $shim($($arg: $ty),*) -> $ret {
            $target($($arg),*)
        }
    };
    ($vis:vis fn $shim:ident ( $($arg:ident : $ty:ty),* $(,)? ) => $target:path) => {
        $vis extern "C" fn $shim($($arg: $ty),*) {
            $target($($arg),*)
        }
    };
}
