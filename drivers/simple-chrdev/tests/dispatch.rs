use std::thread;

use kernel::{
    buf::UserSliceWriter,
    chrdev::{CharDeviceTable, DeviceNumber},
    code::{EBADF, EINVAL, ENOTTY, ENXIO},
    fs::{File, FileFlags, FileOperations},
};
use simple_chrdev::{DeviceController, DriverConfig, SIMPLE_FOPS};

fn file() -> File {
    File::new(DeviceNumber::new(254, 0), FileFlags::RDONLY)
}

#[test]
fn open_and_release_are_no_ops() {
    let f = file();
    for i in 0..50 {
        if i % 3 == 0 {
            assert_eq!(SIMPLE_FOPS.release(&f), Ok(()));
        } else {
            assert_eq!(SIMPLE_FOPS.open(&f), Ok(()));
        }
    }
    assert_eq!(f.device(), DeviceNumber::new(254, 0));
    assert_eq!(f.flags(), FileFlags::RDONLY);
}

#[test]
fn read_reports_end_of_stream_for_every_length() {
    let lengths = [0usize, 1, 2, 127, 128, 4096, 65536, 1 << 24];
    for len in lengths {
        let mut buf = vec![0xa5u8; len];
        let mut writer = UserSliceWriter::new(&mut buf);
        assert_eq!(SIMPLE_FOPS.read(&file(), &mut writer, 0), Ok(0));
        assert_eq!(writer.written(), 0);
        assert_eq!(writer.len(), len);
        assert!(buf.iter().all(|b| *b == 0xa5));
    }
}

#[test]
fn read_ignores_the_offset() {
    let mut buf = [0u8; 16];
    for offset in [0u64, 1, 4096, u64::MAX] {
        let mut writer = UserSliceWriter::new(&mut buf);
        assert_eq!(SIMPLE_FOPS.read(&file(), &mut writer, offset), Ok(0));
    }
}

#[test]
fn user_space_sees_an_empty_node() {
    let table = CharDeviceTable::new();
    let mut controller =
        DeviceController::new(&table, &table, &SIMPLE_FOPS, DriverConfig::default());
    controller.activate().unwrap();
    let dev = controller.device().unwrap();

    let mut file = table.open(dev, FileFlags::RDONLY).unwrap();
    let mut buf = [0u8; 128];
    assert_eq!(file.read(&mut buf), Ok(0));
    assert_eq!(file.read(&mut buf), Ok(0));
    assert_eq!(file.position(), 0);
    assert_eq!(file.ioctl(0x5401, 0), Err(ENOTTY));
    file.close().unwrap();

    let mut file = table.open(dev, FileFlags::RDWR).unwrap();
    assert_eq!(file.write(b"hello"), Err(EINVAL));
    drop(file);

    let mut file = table.open(dev, FileFlags::WRONLY).unwrap();
    assert_eq!(file.read(&mut buf), Err(EBADF));
    drop(file);

    assert_eq!(table.allocated_regions(), 1);
    assert_eq!(table.live_registrations(), 1);

    controller.deactivate();
    assert_eq!(table.open(dev, FileFlags::RDONLY).err(), Some(ENXIO));
}

#[test]
fn concurrent_callers_need_no_locking() {
    let table = CharDeviceTable::new();
    let mut controller =
        DeviceController::new(&table, &table, &SIMPLE_FOPS, DriverConfig::default());
    controller.activate().unwrap();
    let dev = controller.device().unwrap();

    thread::scope(|s| {
        for _ in 0..8 {
            s.spawn(|| {
                let mut buf = [0u8; 64];
                for _ in 0..200 {
                    let mut file = table.open(dev, FileFlags::RDONLY).unwrap();
                    assert_eq!(file.read(&mut buf), Ok(0));
                    file.close().unwrap();
                }
            });
        }
    });

    assert_eq!(table.live_registrations(), 1);
    controller.deactivate();
    assert_eq!(table.allocated_regions(), 0);
}
