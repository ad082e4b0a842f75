use std::fs::OpenOptions;
use std::io;
use std::os::unix::fs::FileExt;
use std::path::Path;

use crate::driver::Backing;

pub struct FileBacking {
    file: std::fs::File,
    size: u64,
}

impl FileBacking {
    pub fn create(path: &Path, size: u64) -> io::Result<FileBacking> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        file.set_len(size)?;
        Ok(FileBacking { file, size })
    }

    pub fn open(path: &Path) -> io::Result<FileBacking> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let size = file.metadata()?.len();
        Ok(FileBacking { file, size })
    }
}

impl Backing for FileBacking {
    fn len(&self) -> u64 {
        self.size
    }

    fn read_at(&self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact_at(buf, offset)
    }

    fn write_at(&mut self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.file.write_all_at(data, offset)
    }
}
