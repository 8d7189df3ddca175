//! 顺序与渐进式扫描的熵解码，以及基线扫描的重新编码。
//!
//! 解码、编码和符号统计共用同一个块遍历顺序 [`walk_blocks`]，
//! 保证三者对 MCU、重启间隔的理解完全一致。

use super::bitio::{BitReader, BitWriter};
use super::error::{JpegError, Result};
use super::frame::Frame;
use super::grid::BlockGrid;
use super::huffman::{
    AC_CLASS, DC_CLASS, HuffmanDecoder, HuffmanEncoder, HuffmanSpec, category, extend,
    magnitude_bits,
};
use super::marker::Band;
use super::zigzag::{ZIGZAG, to_zigzag};

/// 扫描中的一个分量：帧内下标与所用的哈夫曼表。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanComponent {
    pub component: usize,
    pub dc_table: u8,
    pub ac_table: u8,
}

/// 当前生效的 DC/AC 哈夫曼表，按表号索引。
#[derive(Debug, Clone, Default)]
pub struct TableSet {
    pub dc: [Option<HuffmanSpec>; 4],
    pub ac: [Option<HuffmanSpec>; 4],
}

impl TableSet {
    /// 登记一张表，同类同号的旧表被覆盖。
    pub fn insert(&mut self, spec: HuffmanSpec) {
        let id = usize::from(spec.id & 3);
        if spec.class == DC_CLASS {
            self.dc[id] = Some(spec);
        } else {
            self.ac[id] = Some(spec);
        }
    }

    fn get(&self, class: u8, id: u8) -> Result<&HuffmanSpec> {
        let (slot, name) = if class == DC_CLASS {
            (&self.dc, "DC")
        } else {
            (&self.ac, "AC")
        };
        slot[usize::from(id & 3)]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable { class: name, id })
    }
}

/// 每类每张表的符号频率。
pub struct SymbolCounts {
    pub dc: [[u32; 256]; 4],
    pub ac: [[u32; 256]; 4],
}

/// 遍历到的一个块。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRef {
    /// 在扫描分量列表中的位置。
    pub slot: usize,
    pub bx: usize,
    pub by: usize,
    /// 该块之前需要一个 RST 标记时，给出它的序号。
    pub restart: Option<usize>,
}

/// 按码流顺序访问扫描中的每个块。
///
/// 单分量扫描按可见块逐行遍历；多分量扫描按 MCU 交织遍历，
/// 每个 MCU 内依次访问各分量的 `H x V` 个块。
pub fn walk_blocks<F>(
    frame: &Frame,
    scan: &[ScanComponent],
    restart_interval: u16,
    mut visit: F,
) -> Result<()>
where
    F: FnMut(BlockRef) -> Result<()>,
{
    let interval = usize::from(restart_interval);
    let restart_before = |unit: usize| {
        (interval > 0 && unit > 0 && unit % interval == 0).then(|| unit / interval - 1)
    };

    if let [only] = scan {
        let (wide, tall) = frame.visible_blocks(only.component);
        for by in 0..tall {
            for bx in 0..wide {
                visit(BlockRef {
                    slot: 0,
                    bx,
                    by,
                    restart: restart_before(by * wide + bx),
                })?;
            }
        }
        return Ok(());
    }

    for my in 0..frame.mcus_tall {
        for mx in 0..frame.mcus_wide {
            let mut restart = restart_before(my * frame.mcus_wide + mx);
            for (slot, sc) in scan.iter().enumerate() {
                let c = &frame.components[sc.component];
                let (h, v) = (usize::from(c.h_sampling), usize::from(c.v_sampling));
                for dy in 0..v {
                    for dx in 0..h {
                        visit(BlockRef {
                            slot,
                            bx: mx * h + dx,
                            by: my * v + dy,
                            restart: restart.take(),
                        })?;
                    }
                }
            }
        }
    }
    Ok(())
}

/// 为帧的每个分量分配 MCU 对齐的空块网格。
pub fn empty_grids(frame: &Frame) -> Vec<BlockGrid> {
    (0..frame.components.len())
        .map(|i| {
            let (wide, tall) = frame.padded_blocks(i);
            BlockGrid::new(wide, tall)
        })
        .collect()
}

/// 一次扫描内跨块保留的解码状态，遇到 RST 时清零。
struct ScanState<'a> {
    reader: BitReader<'a>,
    predictors: Vec<i32>,
    /// 渐进式 AC 扫描中剩余的全零频带块数。
    eob_run: u32,
}

/// 按 [`walk_blocks`] 的顺序把每个块交给 `decode_block`。
fn run_scan<'a, F>(
    data: &'a [u8],
    start: usize,
    frame: &Frame,
    scan: &[ScanComponent],
    restart_interval: u16,
    grids: &mut [BlockGrid],
    mut decode_block: F,
) -> Result<()>
where
    F: FnMut(&mut ScanState<'a>, usize, &mut [i16]) -> Result<()>,
{
    let mut state = ScanState {
        reader: BitReader::new(data, start),
        predictors: vec![0; scan.len()],
        eob_run: 0,
    };
    walk_blocks(frame, scan, restart_interval, |b| {
        if b.restart.is_some() {
            state.reader.restart();
            state.predictors.fill(0);
            state.eob_run = 0;
        }
        let block = grids[scan[b.slot].component].block_mut(b.bx, b.by);
        decode_block(&mut state, b.slot, block)
    })
}

/// 扫描中每个分量对应 `class` 类的解码表。
fn decoders_for(scan: &[ScanComponent], tables: &TableSet, class: u8) -> Result<Vec<HuffmanDecoder>> {
    scan.iter()
        .map(|sc| {
            let id = if class == DC_CLASS {
                sc.dc_table
            } else {
                sc.ac_table
            };
            HuffmanDecoder::new(tables.get(class, id)?)
        })
        .collect()
}

/// 解码一次顺序扫描 (完整频带)，把结果写入 `grids` 中对应分量的块。
pub fn decode_sequential(
    data: &[u8],
    start: usize,
    frame: &Frame,
    scan: &[ScanComponent],
    tables: &TableSet,
    restart_interval: u16,
    grids: &mut [BlockGrid],
) -> Result<()> {
    let dc = decoders_for(scan, tables, DC_CLASS)?;
    let ac = decoders_for(scan, tables, AC_CLASS)?;
    run_scan(data, start, frame, scan, restart_interval, grids, |state, slot, block| {
        decode_block(
            &mut state.reader,
            &dc[slot],
            &ac[slot],
            &mut state.predictors[slot],
            block,
        )
    })
}

/// 解码一次渐进式扫描，在 `grids` 已有的系数上累加 `band` 描述的部分。
#[allow(clippy::too_many_arguments)]
pub fn decode_progressive(
    data: &[u8],
    start: usize,
    frame: &Frame,
    scan: &[ScanComponent],
    tables: &TableSet,
    restart_interval: u16,
    band: Band,
    grids: &mut [BlockGrid],
) -> Result<()> {
    let al = band.al;
    match (band.ss == 0, band.ah == 0) {
        (true, true) => {
            let dc = decoders_for(scan, tables, DC_CLASS)?;
            run_scan(data, start, frame, scan, restart_interval, grids, |state, slot, block| {
                dc_first(&mut state.reader, &dc[slot], al, &mut state.predictors[slot], block)
            })
        }
        (true, false) => run_scan(data, start, frame, scan, restart_interval, grids, |state, _, block| {
            if state.reader.read(1)? == 1 {
                block[0] |= 1 << al;
            }
            Ok(())
        }),
        (false, true) => {
            let ac = decoders_for(scan, tables, AC_CLASS)?;
            run_scan(data, start, frame, scan, restart_interval, grids, |state, slot, block| {
                ac_first(&mut state.reader, &ac[slot], band, &mut state.eob_run, block)
            })
        }
        (false, false) => {
            let ac = decoders_for(scan, tables, AC_CLASS)?;
            run_scan(data, start, frame, scan, restart_interval, grids, |state, slot, block| {
                ac_refine(&mut state.reader, &ac[slot], band, &mut state.eob_run, block)
            })
        }
    }
}

fn decode_block(
    reader: &mut BitReader,
    dc: &HuffmanDecoder,
    ac: &HuffmanDecoder,
    predictor: &mut i32,
    block: &mut [i16],
) -> Result<()> {
    dc_first(reader, dc, 0, predictor, block)?;

    let mut k = 1;
    while k < 64 {
        let rs = ac.decode(reader)?;
        let (run, size) = (usize::from(rs >> 4), rs & 0x0F);
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            break;
        }
        k += run;
        if k > 63 {
            return Err(JpegError::InvalidHuffmanCode);
        }
        block[ZIGZAG[k]] = to_coefficient(extend(reader.read(size)?, size))?;
        k += 1;
    }
    Ok(())
}

/// DC 差分解码；渐进式首次扫描中结果左移 `al` 位。
fn dc_first(
    reader: &mut BitReader,
    dc: &HuffmanDecoder,
    al: u8,
    predictor: &mut i32,
    block: &mut [i16],
) -> Result<()> {
    let size = dc.decode(reader)?;
    if size > 16 {
        return Err(JpegError::InvalidHuffmanCode);
    }
    *predictor += extend(reader.read(size)?, size);
    block[0] = to_coefficient(*predictor << al)?;
    Ok(())
}

/// 读出 EOBn 的块数 (含当前块)。
fn eob_run_length(reader: &mut BitReader, run: u8) -> Result<u32> {
    Ok((1 << run) + u32::from(reader.read(run)?))
}

/// 渐进式 AC 首次扫描 (T.81 G.1.2.2)。
fn ac_first(
    reader: &mut BitReader,
    ac: &HuffmanDecoder,
    band: Band,
    eob_run: &mut u32,
    block: &mut [i16],
) -> Result<()> {
    if *eob_run > 0 {
        *eob_run -= 1;
        return Ok(());
    }

    let se = usize::from(band.se);
    let mut k = usize::from(band.ss);
    while k <= se {
        let rs = ac.decode(reader)?;
        let (run, size) = (rs >> 4, rs & 0x0F);
        if size == 0 {
            if run == 15 {
                k += 16;
                continue;
            }
            *eob_run = eob_run_length(reader, run)? - 1;
            break;
        }
        k += usize::from(run);
        if k > se {
            return Err(JpegError::InvalidHuffmanCode);
        }
        block[ZIGZAG[k]] = to_coefficient(extend(reader.read(size)?, size) << band.al)?;
        k += 1;
    }
    Ok(())
}

/// 渐进式 AC 细化扫描 (T.81 G.1.2.3)。
///
/// 已非零的系数每经过一个读一位修正；新出现的系数幅值总是 `1 << al`。
fn ac_refine(
    reader: &mut BitReader,
    ac: &HuffmanDecoder,
    band: Band,
    eob_run: &mut u32,
    block: &mut [i16],
) -> Result<()> {
    let bit = 1i16 << band.al;
    let se = usize::from(band.se);
    let mut k = usize::from(band.ss);

    if *eob_run == 0 {
        while k <= se {
            let rs = ac.decode(reader)?;
            let (run, size) = (rs >> 4, rs & 0x0F);
            let value = match (size, run) {
                // ZRL：跳过 16 个零系数
                (0, 15) => 0,
                (0, _) => {
                    *eob_run = eob_run_length(reader, run)?;
                    break;
                }
                (1, _) if reader.read(1)? == 1 => bit,
                (1, _) => -bit,
                _ => return Err(JpegError::InvalidHuffmanCode),
            };
            let mut zeros = run;

            while k <= se {
                let coefficient = &mut block[ZIGZAG[k]];
                k += 1;
                if *coefficient != 0 {
                    refine(reader, coefficient, bit)?;
                } else if zeros == 0 {
                    *coefficient = value;
                    break;
                } else {
                    zeros -= 1;
                }
            }
        }
    }

    if *eob_run > 0 {
        while k <= se {
            let coefficient = &mut block[ZIGZAG[k]];
            if *coefficient != 0 {
                refine(reader, coefficient, bit)?;
            }
            k += 1;
        }
        *eob_run -= 1;
    }
    Ok(())
}

/// 读一位修正：为 1 时把幅值增加 `bit` (保持符号)。
fn refine(reader: &mut BitReader, coefficient: &mut i16, bit: i16) -> Result<()> {
    if reader.read(1)? == 1 && *coefficient & bit == 0 {
        let delta = if *coefficient > 0 { bit } else { -bit };
        *coefficient = to_coefficient(i32::from(*coefficient) + i32::from(delta))?;
    }
    Ok(())
}

fn to_coefficient(value: i32) -> Result<i16> {
    i16::try_from(value).map_err(|_| JpegError::InvalidHuffmanCode)
}

/// 接收编码过程产生的符号与附加位。
trait SymbolSink {
    fn symbol(&mut self, class: u8, table: u8, symbol: u8) -> Result<()>;
    fn bits(&mut self, value: u16, size: u8);
    fn restart(&mut self, index: usize);
}

struct FrequencyCounter {
    counts: SymbolCounts,
}

impl SymbolSink for FrequencyCounter {
    fn symbol(&mut self, class: u8, table: u8, symbol: u8) -> Result<()> {
        let counts = if class == DC_CLASS {
            &mut self.counts.dc
        } else {
            &mut self.counts.ac
        };
        counts[usize::from(table & 3)][usize::from(symbol)] += 1;
        Ok(())
    }

    fn bits(&mut self, _value: u16, _size: u8) {}

    fn restart(&mut self, _index: usize) {}
}

struct EntropyWriter {
    writer: BitWriter,
    dc: [Option<HuffmanEncoder>; 4],
    ac: [Option<HuffmanEncoder>; 4],
}

impl SymbolSink for EntropyWriter {
    fn symbol(&mut self, class: u8, table: u8, symbol: u8) -> Result<()> {
        let (encoders, name) = if class == DC_CLASS {
            (&self.dc, "DC")
        } else {
            (&self.ac, "AC")
        };
        let encoder = encoders[usize::from(table & 3)]
            .as_ref()
            .ok_or(JpegError::MissingHuffmanTable { class: name, id: table })?;
        let (code, len) = encoder.code(symbol)?;
        self.writer.write(code, len);
        Ok(())
    }

    fn bits(&mut self, value: u16, size: u8) {
        self.writer.write(value, size);
    }

    fn restart(&mut self, index: usize) {
        self.writer.restart(index);
    }
}

fn emit_scan<S: SymbolSink>(
    frame: &Frame,
    scan: &[ScanComponent],
    restart_interval: u16,
    grids: &[BlockGrid],
    sink: &mut S,
) -> Result<()> {
    let mut predictors = vec![0i32; scan.len()];
    walk_blocks(frame, scan, restart_interval, |b| {
        if let Some(index) = b.restart {
            sink.restart(index);
            predictors.fill(0);
        }
        let sc = &scan[b.slot];
        let zz = to_zigzag(grids[sc.component].block(b.bx, b.by));
        emit_block(&zz, sc, &mut predictors[b.slot], sink)
    })
}

fn emit_block<S: SymbolSink>(
    zz: &[i16; 64],
    sc: &ScanComponent,
    predictor: &mut i32,
    sink: &mut S,
) -> Result<()> {
    let diff = i32::from(zz[0]) - *predictor;
    *predictor = i32::from(zz[0]);
    let size = category(diff);
    sink.symbol(DC_CLASS, sc.dc_table, size)?;
    sink.bits(magnitude_bits(diff, size), size);

    let mut run = 0u8;
    for &value in &zz[1..] {
        if value == 0 {
            run += 1;
            continue;
        }
        while run > 15 {
            sink.symbol(AC_CLASS, sc.ac_table, 0xF0)?;
            run -= 16;
        }
        let value = i32::from(value);
        let size = category(value);
        sink.symbol(AC_CLASS, sc.ac_table, (run << 4) | size)?;
        sink.bits(magnitude_bits(value, size), size);
        run = 0;
    }
    if run > 0 {
        sink.symbol(AC_CLASS, sc.ac_table, 0x00)?;
    }
    Ok(())
}

/// 用给定的表重新编码整个扫描，返回熵编码数据 (不含 SOS 段)。
pub fn encode(
    frame: &Frame,
    scan: &[ScanComponent],
    tables: &TableSet,
    restart_interval: u16,
    grids: &[BlockGrid],
) -> Result<Vec<u8>> {
    let encoders = |specs: &[Option<HuffmanSpec>; 4]| {
        std::array::from_fn(|i| specs[i].as_ref().map(HuffmanEncoder::new))
    };
    let mut sink = EntropyWriter {
        writer: BitWriter::new(),
        dc: encoders(&tables.dc),
        ac: encoders(&tables.ac),
    };
    emit_scan(frame, scan, restart_interval, grids, &mut sink)?;
    Ok(sink.writer.finish())
}

/// 统计重新编码时每张表需要的符号频率。
pub fn count_symbols(
    frame: &Frame,
    scan: &[ScanComponent],
    restart_interval: u16,
    grids: &[BlockGrid],
) -> Result<SymbolCounts> {
    let mut sink = FrequencyCounter {
        counts: SymbolCounts {
            dc: [[0; 256]; 4],
            ac: [[0; 256]; 4],
        },
    };
    emit_scan(frame, scan, restart_interval, grids, &mut sink)?;
    Ok(sink.counts)
}
