use std::ffi::OsStr;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use fuser::{
    FileAttr, FileType, Filesystem, ReplyAttr, ReplyData, ReplyDirectory, ReplyEmpty, ReplyEntry,
    ReplyWrite, Request, TimeOrNow, FUSE_ROOT_ID,
};
use log::debug;

use crate::driver::Backing;
use crate::ops::{Attributes, FlatFs};
use crate::util::clock::unix_now;
use crate::util::mode::ModeBitsHelper;

const TTL: Duration = Duration::from_secs(1);

/// Translates the kernel's inode-number callbacks onto the path-keyed
/// operation surface. The namespace is flat, so the root directory is the
/// only parent the kernel ever names; slot `i` is exposed as inode `i + 1`.
pub struct FuseDriver<B: Backing> {
    fs: FlatFs<B>,
}

impl<B: Backing> FuseDriver<B> {
    pub fn new(fs: FlatFs<B>) -> FuseDriver<B> {
        FuseDriver { fs }
    }

    fn ino_path(&self, ino: u64) -> Option<String> {
        let index = (ino as usize).checked_sub(1)?;
        self.fs.slot_path(index).map(str::to_string)
    }

    fn child_path(name: &OsStr) -> String {
        format!("/{}", name.to_string_lossy())
    }

    fn file_attr(&self, attrs: &Attributes) -> FileAttr {
        FileAttr {
            ino: attrs.slot as u64 + 1,
            size: attrs.size.max(0) as u64,
            blocks: if attrs.size > 0 { 1 } else { 0 },
            atime: timestamp(attrs.accessed_at),
            mtime: timestamp(attrs.modified_at),
            ctime: timestamp(attrs.changed_at),
            crtime: timestamp(attrs.changed_at),
            kind: if attrs.mode.is_directory() {
                FileType::Directory
            } else {
                FileType::RegularFile
            },
            perm: attrs.mode.permissions(),
            nlink: attrs.links,
            uid: attrs.uid,
            gid: attrs.gid,
            rdev: 0,
            flags: 0,
            blksize: self.fs.block_size() as u32,
        }
    }
}

fn timestamp(seconds: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(seconds.max(0) as u64)
}

fn seconds(time: TimeOrNow) -> i64 {
    match time {
        TimeOrNow::Now => unix_now(),
        TimeOrNow::SpecificTime(t) => t
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0),
    }
}

impl<B: Backing> Filesystem for FuseDriver<B> {
    fn lookup(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEntry) {
        if parent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }
        match self.fs.get_attributes(&Self::child_path(name)) {
            Ok(attrs) => reply.entry(&TTL, &self.file_attr(&attrs), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn getattr(&mut self, _req: &Request<'_>, ino: u64, reply: ReplyAttr) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.get_attributes(&path) {
            Ok(attrs) => reply.attr(&TTL, &self.file_attr(&attrs)),
            Err(e) => reply.error(e.errno()),
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn setattr(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        mode: Option<u32>,
        _uid: Option<u32>,
        _gid: Option<u32>,
        size: Option<u64>,
        atime: Option<TimeOrNow>,
        mtime: Option<TimeOrNow>,
        _ctime: Option<SystemTime>,
        _fh: Option<u64>,
        _crtime: Option<SystemTime>,
        _chgtime: Option<SystemTime>,
        _bkuptime: Option<SystemTime>,
        _flags: Option<u32>,
        reply: ReplyAttr,
    ) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };

        if let Some(mode) = mode {
            if let Err(e) = self.fs.set_mode(&path, mode) {
                reply.error(e.errno());
                return;
            }
        }
        if let Some(size) = size {
            if let Err(e) = self.fs.truncate(&path, size as i64) {
                reply.error(e.errno());
                return;
            }
        }
        if atime.is_some() || mtime.is_some() {
            let current = match self.fs.get_attributes(&path) {
                Ok(attrs) => attrs,
                Err(e) => {
                    reply.error(e.errno());
                    return;
                }
            };
            let accessed = atime.map(seconds).unwrap_or(current.accessed_at);
            let modified = mtime.map(seconds).unwrap_or(current.modified_at);
            if let Err(e) = self.fs.set_times(&path, accessed, modified) {
                reply.error(e.errno());
                return;
            }
        }

        match self.fs.get_attributes(&path) {
            Ok(attrs) => reply.attr(&TTL, &self.file_attr(&attrs)),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn mknod(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        mode: u32,
        _umask: u32,
        _rdev: u32,
        reply: ReplyEntry,
    ) {
        if parent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }
        let path = Self::child_path(name);
        if let Err(e) = self.fs.create(&path, mode) {
            reply.error(e.errno());
            return;
        }
        match self.fs.get_attributes(&path) {
            Ok(attrs) => reply.entry(&TTL, &self.file_attr(&attrs), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn unlink(&mut self, _req: &Request<'_>, parent: u64, name: &OsStr, reply: ReplyEmpty) {
        if parent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }
        match self.fs.unlink(&Self::child_path(name)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn rename(
        &mut self,
        _req: &Request<'_>,
        parent: u64,
        name: &OsStr,
        newparent: u64,
        newname: &OsStr,
        _flags: u32,
        reply: ReplyEmpty,
    ) {
        if parent != FUSE_ROOT_ID || newparent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }
        match self.fs.rename(&Self::child_path(name), &Self::child_path(newname)) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn link(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        newparent: u64,
        newname: &OsStr,
        reply: ReplyEntry,
    ) {
        if newparent != FUSE_ROOT_ID {
            reply.error(libc::ENOENT);
            return;
        }
        let Some(src) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let dst = Self::child_path(newname);
        if let Err(e) = self.fs.link(&src, &dst) {
            reply.error(e.errno());
            return;
        }
        match self.fs.get_attributes(&dst) {
            Ok(attrs) => reply.entry(&TTL, &self.file_attr(&attrs), 0),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn read(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        size: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyData,
    ) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.read(&path, size as usize, offset) {
            Ok(bytes) => reply.data(&bytes),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn write(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        data: &[u8],
        _write_flags: u32,
        _flags: i32,
        _lock_owner: Option<u64>,
        reply: ReplyWrite,
    ) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.write(&path, data, offset) {
            Ok(written) => reply.written(written as u32),
            Err(e) => reply.error(e.errno()),
        }
    }

    fn readdir(
        &mut self,
        _req: &Request<'_>,
        ino: u64,
        _fh: u64,
        offset: i64,
        mut reply: ReplyDirectory,
    ) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        let names: Vec<String> = match self.fs.read_dir(&path) {
            Ok(entries) => entries.collect(),
            Err(e) => {
                reply.error(e.errno());
                return;
            }
        };

        for (position, name) in names.iter().enumerate().skip(offset as usize) {
            let (entry_ino, kind) = if name == "." || name == ".." {
                (FUSE_ROOT_ID, FileType::Directory)
            } else {
                match self.fs.get_attributes(&format!("/{}", name)) {
                    Ok(attrs) => (
                        attrs.slot as u64 + 1,
                        if attrs.mode.is_directory() {
                            FileType::Directory
                        } else {
                            FileType::RegularFile
                        },
                    ),
                    Err(e) => {
                        reply.error(e.errno());
                        return;
                    }
                }
            };
            debug!("readdir entry {:?} ino={}", name, entry_ino);
            if reply.add(entry_ino, position as i64 + 1, kind, name) {
                break;
            }
        }
        reply.ok();
    }

    fn access(&mut self, _req: &Request<'_>, ino: u64, mask: i32, reply: ReplyEmpty) {
        let Some(path) = self.ino_path(ino) else {
            reply.error(libc::ENOENT);
            return;
        };
        match self.fs.access(&path, mask) {
            Ok(()) => reply.ok(),
            Err(e) => reply.error(e.errno()),
        }
    }
}
