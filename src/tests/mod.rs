//! Cross-module tests: EXIF to mosaic to written report, with the network
//! replaced by in-process fakes.
