#![allow(dead_code)]

use std::io::Cursor;

use dcb_loader::prog::symbols::SysProcReference;
use dcb_loader::prog::types::{BaseType, TypeDescriptor};
use dcb_loader::prog::vars::VariableRecord;
use dcb_loader::{HostProc, LoadResult, Module, ModuleImage, ModuleLoader, ProcImage, SysProcTable};

pub const MAIN: u32 = 0x100;
pub const SPAWN: u32 = 0x101;
pub const SAY: u32 = 0x200;
pub const WRITE: u32 = 0x201;
pub const SCORE: u32 = 0x300;
pub const POS: u32 = 0x301;

pub const SAY_CALL: u32 = 12;
pub const WRITE_CALL: u32 = 13;

pub fn dword() -> TypeDescriptor {
    TypeDescriptor::scalar(BaseType::Dword)
}

pub fn array(count: u32, element: &TypeDescriptor) -> TypeDescriptor {
    TypeDescriptor::array_of(count, element).expect("room for another dimension")
}

/// A small game-like module: a dword score, a two-point array of
/// `struct { word x; word y; }`, two procedures, and two sysprocs.
/// MAIN carries private data and public data (a dword and a word).
pub fn game_image() -> ModuleImage {
    let point = vec![
        VariableRecord::new(0, 0, TypeDescriptor::scalar(BaseType::Word)),
        VariableRecord::new(0, 2, TypeDescriptor::scalar(BaseType::Word)),
    ];
    let globals = vec![
        VariableRecord::new(SCORE, 0, dword()),
        VariableRecord::new(POS, 4, array(2, &TypeDescriptor::structure(0))),
    ];
    let global_data = [
        0x01, 0x02, 0x03, 0x04, // score
        0x10, 0x11, 0x12, 0x13, // pos[0]
        0x20, 0x21, 0x22, 0x23, // pos[1]
    ];
    ModuleImage::new()
        .id(MAIN, "MAIN")
        .id(SPAWN, "SPAWN")
        .id(SAY, "SAY")
        .id(WRITE, "WRITE")
        .id(SCORE, "SCORE")
        .id(POS, "POS")
        .string("hello")
        .string("world")
        .import(0xCAFE)
        .varspace(point)
        .globals(&global_data, globals)
        .locals(&[0xAA, 0xBB, 0xCC, 0xDD], vec![VariableRecord::new(0, 0, dword())])
        .local_strings(&[1])
        .proc(
            ProcImage::new(MAIN)
                .with_code(&[0x0001_0002, 0x0003_0004, 0])
                .with_handlers(8, 0)
                .with_private(&[9, 8, 7, 6], vec![VariableRecord::new(0, 0, dword())])
                .with_public(
                    &[0x51, 0x52, 0x53, 0x54, 0x61, 0x62],
                    vec![
                        VariableRecord::new(0, 0, dword()),
                        VariableRecord::new(0, 4, TypeDescriptor::scalar(BaseType::Word)),
                    ],
                )
                .with_strings(&[0], &[]),
        )
        .proc(ProcImage::new(SPAWN).with_params(2).with_flags(0x04))
        .sysproc(SysProcReference::new(SAY, 1, 2, SAY_CALL, b"II"))
        .sysproc(SysProcReference::new(WRITE, 0, 1, WRITE_CALL, b"S"))
}

pub fn say_host() -> SysProcTable {
    SysProcTable::new().with(HostProc::new("SAY", 1, 2, "II", 7))
}

pub fn load(loader: &ModuleLoader, bytes: Vec<u8>) -> LoadResult<Module> {
    loader.load(Cursor::new(bytes), 0, &say_host())
}
