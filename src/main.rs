mod consts;
mod driver;
mod fuse;
mod ops;
mod store;
mod util;

use std::path::PathBuf;

use clap::Parser;
use fuser::MountOption;
use log::info;

use crate::driver::file_backing::FileBacking;
use crate::fuse::filesystem::FuseDriver;
use crate::ops::FlatFs;
use crate::store::{Geometry, Store};

#[derive(Parser)]
struct Cli {
    /// Backing image file; created and sized on first use
    image: PathBuf,

    /// Directory to mount the filesystem on
    mountpoint: PathBuf,

    /// Filesystem name reported to the kernel
    #[arg(long, default_value = "flatfs")]
    fs_name: String,

    /// Unmount automatically when the process exits
    #[arg(long)]
    auto_unmount: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let geometry = Geometry::default();
    let store = if cli.image.exists() {
        info!("reusing image {:?}", cli.image);
        Store::mount(FileBacking::open(&cli.image)?, geometry)?
    } else {
        info!("creating image {:?}", cli.image);
        Store::format(FileBacking::create(&cli.image, geometry.region_size())?, geometry)?
    };

    let mut options = vec![MountOption::FSName(cli.fs_name)];
    if cli.auto_unmount {
        options.push(MountOption::AutoUnmount);
    }

    fuser::mount2(FuseDriver::new(FlatFs::new(store)), &cli.mountpoint, &options)?;
    Ok(())
}
