use autopip::imports::ExtractError;
use autopip::extract_imports;
use pretty_assertions::assert_eq;

#[test]
fn test_extract_from_script_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scraper.py");
    std::fs::write(
        &path,
        r#"#!/usr/bin/env python3
"""Fetch a page and save thumbnails."""
import os, sys
import requests
from bs4 import BeautifulSoup
from PIL import Image as PILImage
import cv2
from . import helpers
from urllib.parse import urljoin


def main():
    import numpy as np
    return np


if __name__ == "__main__":
    main()
"#,
    )
    .unwrap();

    let imports = extract_imports(&path).unwrap();
    let names: Vec<&str> = imports.iter().map(String::as_str).collect();
    assert_eq!(
        names,
        vec!["PIL", "bs4", "cv2", "numpy", "os", "requests", "sys", "urllib"]
    );
}

#[test]
fn test_directory_is_not_a_script() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        extract_imports(dir.path()),
        Err(ExtractError::Io { .. })
    ));
}
