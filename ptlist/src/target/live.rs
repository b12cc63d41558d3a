use super::{DebugContext, VariableRecord, DEFAULT_MAX_STRING_LENGTH};
use anyhow::{anyhow, Context, Result};
use ptlist_dwarf::{
    map_file, CfiTable, DwarfAnalyzer, FrameBase, FrameState, FunctionInfo, LoadOptions,
    StackFrame, Unwinder, VariableInfo, VariableLocation,
};
use ptlist_process::{
    compute_load_bias, dwarf_reg_name_x86_64, MemoryReader, ModuleBias, ProcMaps, ProcessHandle,
    Registers,
};
use ptlist_types::{TypeInfo, TypeRef};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const MAX_FRAMES: usize = 64;

/// How to attach to and describe a live process
#[derive(Debug, Clone)]
pub struct TargetOptions {
    pub pid: u32,
    /// Executable to read symbols from; `/proc/<pid>/exe` when unset
    pub target_path: Option<PathBuf>,
    /// Stack frame to select; the innermost frame with debug info when unset
    pub frame: Option<usize>,
    pub load: LoadOptions,
    pub max_string_length: usize,
}

impl TargetOptions {
    pub fn new(pid: u32) -> Self {
        Self {
            pid,
            target_path: None,
            frame: None,
            load: LoadOptions::default(),
            max_string_length: DEFAULT_MAX_STRING_LENGTH,
        }
    }
}

/// Frame whose variables name lookups see
#[derive(Debug, Clone)]
pub struct SelectedFrame {
    pub index: usize,
    /// Runtime pc of the frame
    pub pc: u64,
    /// Link-time pc used for symbol lookups
    pub lookup_pc: u64,
    pub function: Option<FunctionInfo>,
    pub registers: Registers,
    pub cfa: Option<u64>,
}

/// A stopped process described by the DWARF of its main executable
pub struct LiveTarget {
    process: ProcessHandle,
    analyzer: DwarfAnalyzer,
    bias: ModuleBias,
    frame: Option<SelectedFrame>,
    max_string_length: usize,
}

impl std::fmt::Debug for LiveTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LiveTarget")
            .field("pid", &self.process.pid())
            .field("module", &self.bias.path)
            .field("bias", &format_args!("0x{:x}", self.bias.bias))
            .field("frame", &self.frame.as_ref().map(|f| f.index))
            .finish()
    }
}

impl LiveTarget {
    /// Attach to the process and prepare symbol lookups for one frame
    pub fn attach(options: &TargetOptions) -> Result<Self> {
        let pid = options.pid;
        let process = ProcessHandle::attach(pid)
            .with_context(|| format!("Failed to attach to process {pid}"))?;

        let exe = match &options.target_path {
            Some(path) => std::fs::canonicalize(path)
                .with_context(|| format!("Target file not found: {}", path.display()))?,
            None => process
                .exe_path()
                .with_context(|| format!("Failed to resolve executable of process {pid}"))?,
        };
        info!("Target executable: {}", exe.display());

        let analyzer = DwarfAnalyzer::load(&exe, &options.load)
            .with_context(|| format!("Failed to load debug info for {}", exe.display()))?;
        let maps = ProcMaps::for_pid(pid)?;
        let bias = module_bias(pid, &maps, &exe)
            .with_context(|| format!("Failed to compute load bias of {}", exe.display()))?;
        info!(
            "{} mapped at 0x{:x}-0x{:x}, bias 0x{:x}",
            exe.display(),
            bias.base,
            bias.end,
            bias.bias
        );

        let unwinder = build_unwinder(pid, &maps);
        let registers = process
            .registers()
            .with_context(|| format!("Failed to read registers of process {pid}"))?;
        let frames = unwinder.backtrace(registers, &process, MAX_FRAMES);
        let frame = select_frame(&analyzer, &bias, &frames, options.frame)?;
        match &frame {
            Some(frame) => info!(
                "Selected frame #{} pc=0x{:x} in {}",
                frame.index,
                frame.pc,
                frame
                    .function
                    .as_ref()
                    .map(|f| f.name.as_str())
                    .unwrap_or("??")
            ),
            None => warn!("No frame with debug info, only globals are visible"),
        }

        Ok(Self {
            process,
            analyzer,
            bias,
            frame,
            max_string_length: options.max_string_length,
        })
    }

    pub fn pid(&self) -> u32 {
        self.process.pid()
    }

    pub fn selected_frame(&self) -> Option<&SelectedFrame> {
        self.frame.as_ref()
    }

    pub fn analyzer(&self) -> &DwarfAnalyzer {
        &self.analyzer
    }

    fn locate(&self, info: VariableInfo, frame: Option<&SelectedFrame>) -> Option<VariableRecord> {
        let state = frame.map(|f| FrameState {
            registers: &f.registers,
            cfa: f.cfa,
        });
        let frame_base = if frame.is_some() {
            info.frame_base
        } else {
            FrameBase::Unknown
        };
        match info.location.address(self.bias.bias, frame_base, state.as_ref()) {
            Some(address) => Some(VariableRecord {
                name: info.name,
                address,
                type_info: info.type_info,
            }),
            None => {
                match &info.location {
                    VariableLocation::Register(register) => debug!(
                        "'{}' lives in register {} and has no address",
                        info.name,
                        dwarf_reg_name_x86_64(*register).unwrap_or("?")
                    ),
                    other => debug!("'{}' has no address ({:?})", info.name, other),
                }
                None
            }
        }
    }
}

fn module_bias(pid: u32, maps: &ProcMaps, path: &Path) -> Result<ModuleBias> {
    let mmap = map_file(path)?;
    let object = object::File::parse(&*mmap)?;
    Ok(compute_load_bias(pid, maps, path, &object)?)
}

fn build_unwinder(pid: u32, maps: &ProcMaps) -> Unwinder {
    let mut unwinder = Unwinder::new();
    for module in maps.modules() {
        let loaded = map_file(&module.path).and_then(|mmap| {
            let object = object::File::parse(&*mmap)?;
            let bias = compute_load_bias(pid, maps, &module.path, &object)?;
            let table = CfiTable::from_object(&module.path, &object)?;
            Ok((bias, table))
        });
        match loaded {
            Ok((bias, table)) => unwinder.add_module(bias, table),
            Err(e) => debug!("No unwind info for {}: {:#}", module.path.display(), e),
        }
    }
    debug!("Unwind info loaded for {} modules", unwinder.module_count());
    unwinder
}

fn select_frame(
    analyzer: &DwarfAnalyzer,
    bias: &ModuleBias,
    frames: &[StackFrame],
    wanted: Option<usize>,
) -> Result<Option<SelectedFrame>> {
    let describe = |frame: &StackFrame| {
        // Return addresses point after the call; look up the call itself
        let pc = if frame.index == 0 {
            frame.pc
        } else {
            frame.pc.wrapping_sub(1)
        };
        let lookup_pc = bias.link(pc);
        let function = if bias.contains(pc) {
            analyzer.function_at(lookup_pc)
        } else {
            None
        };
        SelectedFrame {
            index: frame.index,
            pc: frame.pc,
            lookup_pc,
            function,
            registers: frame.registers.clone(),
            cfa: frame.cfa,
        }
    };

    if let Some(index) = wanted {
        let frame = frames.get(index).ok_or_else(|| {
            anyhow!(
                "Frame #{} does not exist (stack has {} frames)",
                index,
                frames.len()
            )
        })?;
        return Ok(Some(describe(frame)));
    }
    Ok(frames
        .iter()
        .map(describe)
        .find(|frame| frame.function.is_some()))
}

impl DebugContext for LiveTarget {
    fn find_variable(&self, name: &str) -> Option<VariableRecord> {
        if let Some(frame) = &self.frame {
            if let Some(function) = &frame.function {
                if let Some(local) = self.analyzer.find_local(function, frame.lookup_pc, name) {
                    return self.locate(local, Some(frame));
                }
            }
        }
        let global = self.analyzer.find_global(name)?;
        self.locate(global, None)
    }

    fn find_first_type(&self, name: &str) -> Option<TypeInfo> {
        self.analyzer.find_type(name)
    }

    fn complete_type(&self, type_ref: TypeRef) -> Option<TypeInfo> {
        self.analyzer.complete_type(type_ref)
    }

    fn memory(&self) -> &dyn MemoryReader {
        &self.process
    }

    fn max_string_length(&self) -> usize {
        self.max_string_length
    }
}
