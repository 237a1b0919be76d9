use std::fmt;

use super::headers::{
    LineEntryRaw, LineKernelHeader, LineProgramHeader, LINE_TABLES_MAGIC, VERSION,
};
use super::{check_envelope, DecodeError, LineColumn, Reader, Writer};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceFile {
    /// Index into [`LineTables::dirs`].
    pub dir: u32,
    pub name: String,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineEntry {
    /// Byte offset into the kernel's code.
    pub offset: u32,
    pub position: LineColumn,
    /// Index into [`LineTables::files`].
    pub file: u32,
}

/// Line table of one kernel.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelLines {
    /// Index into [`LineTables::kernel_names`].
    pub kernel: u32,
    pub code_offset: u32,
    pub size: u32,
    pub entries: Vec<LineEntry>,
}

/// Program-level container of source line tables.
///
/// Every kernel of the program is named, but only kernels with debug data
/// have an entry in `kernels`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LineTables {
    pub device: u32,
    pub stepping_id: u32,
    pub pointer_size: u32,
    pub dirs: Vec<String>,
    pub files: Vec<SourceFile>,
    pub kernel_names: Vec<String>,
    pub kernels: Vec<KernelLines>,
}

impl LineTables {
    /// `dir/name` of file `index`, if both indices are valid.
    pub fn file_path(&self, index: u32) -> Option<String> {
        let file = self.files.get(index as usize)?;
        let dir = self.dirs.get(file.dir as usize)?;
        Some(if dir.is_empty() {
            file.name.clone()
        } else {
            format!("{}/{}", dir.trim_end_matches('/'), file.name)
        })
    }

    /// Panics when a file, directory or kernel index is out of range.
    pub fn encode(&self) -> Vec<u8> {
        for file in &self.files {
            assert!(
                (file.dir as usize) < self.dirs.len(),
                "file {} refers to directory {} of {}",
                file.name,
                file.dir,
                self.dirs.len()
            );
        }

        let mut strings = Writer::default();
        for s in self
            .dirs
            .iter()
            .chain(self.files.iter().map(|f| &f.name))
            .chain(&self.kernel_names)
        {
            strings.c_string(s);
        }
        strings.pad();
        let strings = strings.into_inner();

        let mut w = Writer::default();
        w.header(LineProgramHeader {
            magic: LINE_TABLES_MAGIC,
            version: VERSION,
            size: 0,
            string_table_size: strings.len() as u32,
            dir_table_size: 4,
            file_table_size: 4 + 4 * self.files.len() as u32,
            device: self.device,
            stepping_id: self.stepping_id,
            pointer_size: self.pointer_size,
            num_kernels: self.kernel_names.len() as u32,
            num_kernels_with_debug_data: self.kernels.len() as u32,
        });
        w.bytes(&strings);
        w.header(self.dirs.len() as u32);
        w.header(self.files.len() as u32);
        for file in &self.files {
            w.header(file.dir);
        }

        for kernel in &self.kernels {
            assert!(
                (kernel.kernel as usize) < self.kernel_names.len(),
                "line table for kernel {} of {}",
                kernel.kernel,
                self.kernel_names.len()
            );
            w.header(LineKernelHeader {
                kernel_index: kernel.kernel,
                code_offset: kernel.code_offset,
                size: kernel.size,
            });
            w.header(kernel.entries.len() as u32);
            for entry in &kernel.entries {
                assert!(
                    (entry.file as usize) < self.files.len(),
                    "line entry refers to file {} of {}",
                    entry.file,
                    self.files.len()
                );
                w.header(LineEntryRaw {
                    offset: entry.offset,
                    line_column: entry.position.pack(),
                    file_index: entry.file,
                });
            }
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        let header: LineProgramHeader = r.header("program header")?;
        if header.magic != LINE_TABLES_MAGIC {
            return Err(DecodeError::BadMagic(header.magic));
        }
        check_envelope(header.version, header.size, bytes.len())?;

        let strings = r.take(header.string_table_size as usize, "string table")?;

        let dir_start = r.position();
        let num_dirs = r.u32("directory table")?;
        check_table("directory", header.dir_table_size, r.position() - dir_start)?;

        let file_start = r.position();
        let num_files = r.u32("file table")?;
        let mut file_dirs = Vec::new();
        for _ in 0..num_files {
            file_dirs.push(r.u32("file table entry")?);
        }
        check_table("file", header.file_table_size, r.position() - file_start)?;

        let mut s = Reader::new(strings);
        let dirs = (0..num_dirs)
            .map(|_| s.c_string())
            .collect::<Result<Vec<_>, _>>()?;
        let mut files = Vec::with_capacity(file_dirs.len());
        for dir in file_dirs {
            if dir >= num_dirs {
                return Err(DecodeError::IndexOutOfRange {
                    what: "directory",
                    index: dir,
                    len: dirs.len(),
                });
            }
            files.push(SourceFile {
                dir,
                name: s.c_string()?,
            });
        }
        let kernel_names = (0..header.num_kernels)
            .map(|_| s.c_string())
            .collect::<Result<Vec<_>, _>>()?;

        let mut kernels = Vec::new();
        for _ in 0..header.num_kernels_with_debug_data {
            let kh: LineKernelHeader = r.header("kernel header")?;
            if kh.kernel_index >= header.num_kernels {
                return Err(DecodeError::IndexOutOfRange {
                    what: "kernel",
                    index: kh.kernel_index,
                    len: kernel_names.len(),
                });
            }
            let count = r.u32("line table header")?;
            let mut entries = Vec::new();
            for _ in 0..count {
                let raw: LineEntryRaw = r.header("line table entry")?;
                if raw.file_index >= num_files {
                    return Err(DecodeError::IndexOutOfRange {
                        what: "file",
                        index: raw.file_index,
                        len: files.len(),
                    });
                }
                entries.push(LineEntry {
                    offset: raw.offset,
                    position: LineColumn::unpack(raw.line_column),
                    file: raw.file_index,
                });
            }
            kernels.push(KernelLines {
                kernel: kh.kernel_index,
                code_offset: kh.code_offset,
                size: kh.size,
                entries,
            });
        }
        tracing::debug!(
            files = files.len(),
            kernels = kernel_names.len(),
            with_lines = kernels.len(),
            "decoded line tables"
        );

        Ok(Self {
            device: header.device,
            stepping_id: header.stepping_id,
            pointer_size: header.pointer_size,
            dirs,
            files,
            kernel_names,
            kernels,
        })
    }
}

fn check_table(table: &'static str, declared: u32, actual: usize) -> Result<(), DecodeError> {
    if declared as usize == actual {
        Ok(())
    } else {
        Err(DecodeError::TableSize {
            table,
            declared,
            actual,
        })
    }
}

impl fmt::Display for LineTables {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "line tables: device {} stepping {} pointer size {} kernels {} ({} with debug data)",
            self.device,
            self.stepping_id,
            self.pointer_size,
            self.kernel_names.len(),
            self.kernels.len()
        )?;
        for (i, dir) in self.dirs.iter().enumerate() {
            writeln!(f, "  dir  [{}] {}", i, dir)?;
        }
        for (i, file) in self.files.iter().enumerate() {
            writeln!(f, "  file [{}] {} (dir {})", i, file.name, file.dir)?;
        }
        for kernel in &self.kernels {
            let name = self
                .kernel_names
                .get(kernel.kernel as usize)
                .map_or("?", String::as_str);
            writeln!(
                f,
                "  kernel {} @ {:#x}, {} byte(s), {} line(s)",
                name,
                kernel.code_offset,
                kernel.size,
                kernel.entries.len()
            )?;
            for entry in &kernel.entries {
                let path = self.file_path(entry.file).unwrap_or_else(|| "?".to_string());
                writeln!(f, "    {:#06x} {}:{}", entry.offset, path, entry.position)?;
            }
        }
        Ok(())
    }
}
