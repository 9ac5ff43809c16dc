//! Synthetic boot images for tests.

pub(crate) struct ImageBuilder {
    page_size: u32,
    kernel: Vec<u8>,
    ramdisk: Vec<u8>,
    second: Vec<u8>,
    dt: Vec<u8>,
    board_name: Vec<u8>,
    cmdline: Vec<u8>,
}

impl ImageBuilder {
    pub(crate) fn new(page_size: u32) -> Self {
        Self {
            page_size,
            kernel: Vec::new(),
            ramdisk: Vec::new(),
            second: Vec::new(),
            dt: Vec::new(),
            board_name: Vec::new(),
            cmdline: Vec::new(),
        }
    }

    pub(crate) fn kernel(mut self, data: Vec<u8>) -> Self {
        self.kernel = data;
        self
    }

    pub(crate) fn ramdisk(mut self, data: Vec<u8>) -> Self {
        self.ramdisk = data;
        self
    }

    pub(crate) fn second(mut self, data: Vec<u8>) -> Self {
        self.second = data;
        self
    }

    pub(crate) fn dt(mut self, data: Vec<u8>) -> Self {
        self.dt = data;
        self
    }

    pub(crate) fn board_name(mut self, name: &[u8]) -> Self {
        self.board_name = name.to_vec();
        self
    }

    pub(crate) fn cmdline(mut self, cmdline: &[u8]) -> Self {
        self.cmdline = cmdline.to_vec();
        self
    }

    pub(crate) fn header_bytes(&self) -> Vec<u8> {
        let mut out = b"ANDROID!".to_vec();
        for word in [
            self.kernel.len() as u32,
            0x1000_8000,
            self.ramdisk.len() as u32,
            0x1100_0000,
            self.second.len() as u32,
            0x10f0_0000,
            0x1000_0100,
            self.page_size,
            self.dt.len() as u32,
            0,
        ] {
            out.extend_from_slice(&word.to_le_bytes());
        }
        out.extend_from_slice(&padded(&self.board_name, 16));
        out.extend_from_slice(&padded(&self.cmdline, 512));
        out.extend_from_slice(&[0x5a; 32]);
        out
    }

    /// Header followed by every segment, each starting on a page boundary,
    /// with an empty page between the second bootloader and device tree.
    /// The page size must hold the whole header.
    pub(crate) fn build(&self) -> Vec<u8> {
        let page = self.page_size as usize;
        let mut out = self.header_bytes();
        pad_to_page(&mut out, page);
        for data in [&self.kernel, &self.ramdisk, &self.second] {
            out.extend_from_slice(data);
            pad_to_page(&mut out, page);
        }
        out.resize(out.len() + page, 0);
        out.extend_from_slice(&self.dt);
        pad_to_page(&mut out, page);
        out
    }
}

/// `len` bytes of recognizable filler
pub(crate) fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31) ^ seed).collect()
}

fn padded(data: &[u8], len: usize) -> Vec<u8> {
    let mut out = data.to_vec();
    out.resize(len, 0);
    out
}

fn pad_to_page(out: &mut Vec<u8>, page: usize) {
    out.resize(out.len().next_multiple_of(page), 0);
}
