use std::fs::File;
use std::ops::Deref;

/// The bytes of a trace file, memory mapped where the platform supports it
pub enum TraceBytes {
    #[cfg(unix)]
    Mapped(memmap2::Mmap),
    Buffered(Vec<u8>),
}

impl Deref for TraceBytes {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        match self {
            #[cfg(unix)]
            TraceBytes::Mapped(map) => map,
            TraceBytes::Buffered(buffer) => buffer,
        }
    }
}

/// Loads a trace file for simulation.
///
/// On unix systems the file is memory mapped and the OS is advised that reads
/// will be sequential, which measurably speeds up large traces. Elsewhere the
/// file is read into memory.
pub fn read_trace(file: File) -> Result<TraceBytes, String> {
    #[cfg(unix)]
    {
        use memmap2::{Advice, Mmap};
        unsafe {
            let map = Mmap::map(&file)
                .map_err(|e| format!("couldn't memory map the trace file: {e}"))?;
            map.advise(Advice::Sequential)
                .map_err(|e| format!("failed to provide access advice to the OS: {e}"))?;
            Ok(TraceBytes::Mapped(map))
        }
    }
    #[cfg(not(unix))]
    {
        use std::io::Read;
        let mut file = file;
        let mut buffer = Vec::new();
        file.read_to_end(&mut buffer)
            .map_err(|e| format!("couldn't read the trace file: {e}"))?;
        Ok(TraceBytes::Buffered(buffer))
    }
}
