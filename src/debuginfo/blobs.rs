use std::fmt;

use super::headers::{BlobKernelHeader, BlobProgramHeader, KERNEL_BLOBS_MAGIC, VERSION};
use super::{check_envelope, dword_align, DecodeError, Reader, Writer};

/// Debug blobs of one kernel. Kernels without debug info carry empty blobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelBlob {
    pub name: String,
    pub visa: Vec<u8>,
    pub gen_isa: Vec<u8>,
}

/// Program-level container of per-kernel vISA and GenISA debug blobs.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct KernelBlobs {
    pub device: u32,
    pub stepping_id: u32,
    pub pointer_size: u32,
    pub kernels: Vec<KernelBlob>,
}

impl KernelBlobs {
    pub fn encode(&self) -> Vec<u8> {
        let mut w = Writer::default();
        w.header(BlobProgramHeader {
            magic: KERNEL_BLOBS_MAGIC,
            version: VERSION,
            size: 0,
            device: self.device,
            stepping_id: self.stepping_id,
            pointer_size: self.pointer_size,
            num_kernels: self.kernels.len() as u32,
        });
        for kernel in &self.kernels {
            w.header(BlobKernelHeader {
                name_size: dword_align(kernel.name.len() + 1) as u32,
                visa_size: kernel.visa.len() as u32,
                gen_isa_size: kernel.gen_isa.len() as u32,
            });
            w.padded_name(&kernel.name);
            w.bytes(&kernel.visa);
            w.bytes(&kernel.gen_isa);
        }
        w.finish()
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut r = Reader::new(bytes);
        let header: BlobProgramHeader = r.header("program header")?;
        if header.magic != KERNEL_BLOBS_MAGIC {
            return Err(DecodeError::BadMagic(header.magic));
        }
        check_envelope(header.version, header.size, bytes.len())?;

        let mut kernels = Vec::new();
        for _ in 0..header.num_kernels {
            let kh: BlobKernelHeader = r.header("kernel header")?;
            let name = r.padded_name(kh.name_size)?;
            let visa = r.take(kh.visa_size as usize, "vISA debug info")?.to_vec();
            let gen_isa = r.take(kh.gen_isa_size as usize, "GenISA debug info")?.to_vec();
            kernels.push(KernelBlob {
                name,
                visa,
                gen_isa,
            });
        }
        tracing::debug!(kernels = kernels.len(), "decoded kernel debug blobs");

        Ok(Self {
            device: header.device,
            stepping_id: header.stepping_id,
            pointer_size: header.pointer_size,
            kernels,
        })
    }
}

impl fmt::Display for KernelBlobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "kernel debug blobs: device {} stepping {} pointer size {} kernels {}",
            self.device,
            self.stepping_id,
            self.pointer_size,
            self.kernels.len()
        )?;
        for (i, k) in self.kernels.iter().enumerate() {
            writeln!(
                f,
                "  [{}] {}: vISA {} byte(s), GenISA {} byte(s)",
                i,
                k.name,
                k.visa.len(),
                k.gen_isa.len()
            )?;
        }
        Ok(())
    }
}
