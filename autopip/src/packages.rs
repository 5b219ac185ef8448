//! Module name -> PyPI package name resolution

use lazy_static::lazy_static;
use std::collections::HashMap;

lazy_static! {
    /// Well-known modules whose import name differs from their distribution name
    static ref BUILTIN_MAP: HashMap<&'static str, &'static str> = {
        let mut m = HashMap::new();
        m.insert("bs4", "beautifulsoup4");
        m.insert("cv2", "opencv-python");
        m.insert("sklearn", "scikit-learn");
        m.insert("PIL", "pillow");
        m.insert("yaml", "pyyaml");
        m.insert("Crypto", "pycryptodome");
        m.insert("dateutil", "python-dateutil");
        m.insert("dotenv", "python-dotenv");
        m.insert("skimage", "scikit-image");
        m.insert("jwt", "PyJWT");
        m.insert("serial", "pyserial");
        m.insert("docx", "python-docx");
        m.insert("fitz", "PyMuPDF");
        m.insert("Bio", "biopython");
        m.insert("OpenSSL", "pyOpenSSL");
        m.insert("attr", "attrs");
        m.insert("magic", "python-magic");
        m.insert("usb", "pyusb");
        m
    };
}

/// Fixed module -> package table, built once and read-only afterwards
#[derive(Debug, Clone, Default)]
pub struct StaticMap {
    entries: HashMap<String, String>,
}

impl StaticMap {
    /// The built-in table of known mismatches
    pub fn builtin() -> Self {
        Self {
            entries: BUILTIN_MAP
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }

    /// Built-in table with user entries layered on top (user wins)
    pub fn with_overrides<I, K, V>(overrides: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = Self::builtin();
        map.entries
            .extend(overrides.into_iter().map(|(k, v)| (k.into(), v.into())));
        map
    }

    /// Exact-match lookup; unknown modules map to themselves
    pub fn resolve(&self, module: &str) -> String {
        self.entries
            .get(module)
            .cloned()
            .unwrap_or_else(|| module.to_string())
    }
}
