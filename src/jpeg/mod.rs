//! JPEG 的量化 DCT 系数读写。
//!
//! 支持哈夫曼编码的顺序 (SOF0/SOF1) 与渐进式 (SOF2) 文件。读取时依次解码
//! 每个扫描，把频带选择与逐次逼近累加到同一组系数上。
//!
//! 单扫描的基线文件写回时保留扫描之前的所有标记段，除哈夫曼表可能被重建外
//! 段字节不变。渐进式或多扫描文件写回为一个交织的基线扫描，哈夫曼表按系数
//! 重新统计。两种情况下量化表与采样方式都保持原样，修改系数的最低有效位
//! 不会引入额外的有损压缩。

pub mod bitio;
pub mod error;
pub mod frame;
pub mod grid;
pub mod huffman;
pub mod marker;
pub mod scan;
pub mod zigzag;

#[cfg(test)]
pub(crate) mod test_support;

use log::{debug, warn};

pub use error::JpegError;
pub use frame::Frame;
pub use grid::CoefficientPlane;

use error::Result;
use grid::BlockGrid;
use huffman::{AC_CLASS, DC_CLASS, optimal_spec};
use marker::{ScanSelector, Segment};
use scan::{ScanComponent, TableSet};

/// 已解码到系数层的 JPEG 图像。
#[derive(Debug, Clone)]
pub struct JpegImage {
    /// SOI 之后、熵编码数据之前的所有段，最后一个是 SOS。
    segments: Vec<Segment>,
    frame: Frame,
    scan: Vec<ScanComponent>,
    tables: TableSet,
    restart_interval: u16,
    grids: Vec<BlockGrid>,
}

/// 第一个扫描开始时的状态，单扫描基线文件按它原样写回。
struct FirstScan {
    index: usize,
    scan: Vec<ScanComponent>,
    tables: TableSet,
    restart_interval: u16,
}

impl JpegImage {
    /// 解析 JPEG 字节流并解码全部扫描的系数。
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let (segments, scan_starts) = marker::read_segments(data)?;
        let mut starts = scan_starts.into_iter();

        let mut frame: Option<Frame> = None;
        let mut progressive = false;
        let mut grids = Vec::new();
        let mut covered = Vec::new();
        let mut tables = TableSet::default();
        let mut restart_interval = 0;
        let mut first: Option<FirstScan> = None;
        let mut scan_count = 0;

        for (index, segment) in segments.iter().enumerate() {
            match segment.marker {
                marker::SOF0 | marker::SOF1 | marker::SOF2 => {
                    if frame.is_some() {
                        return Err(JpegError::InvalidSegment {
                            segment: "SOF",
                            reason: "more than one frame header",
                        });
                    }
                    let parsed = Frame::parse(&segment.data)?;
                    progressive = segment.marker == marker::SOF2;
                    grids = scan::empty_grids(&parsed);
                    covered = vec![false; parsed.components.len()];
                    frame = Some(parsed);
                }
                marker::DHT => {
                    for spec in huffman::parse_dht(&segment.data)? {
                        tables.insert(spec);
                    }
                }
                marker::DRI => restart_interval = marker::parse_dri(&segment.data)?,
                marker::SOS => {
                    let start = starts.next().ok_or(JpegError::UnexpectedEof)?;
                    let frame = frame.as_ref().ok_or(JpegError::InvalidSegment {
                        segment: "SOF",
                        reason: "no frame header before the scan",
                    })?;
                    let header = marker::parse_sos(&segment.data)?;
                    header.band.check(progressive, header.selectors.len())?;
                    let scan = resolve_selectors(frame, &header.selectors)?;

                    if progressive {
                        scan::decode_progressive(
                            data,
                            start,
                            frame,
                            &scan,
                            &tables,
                            restart_interval,
                            header.band,
                            &mut grids,
                        )?;
                    } else {
                        scan::decode_sequential(
                            data,
                            start,
                            frame,
                            &scan,
                            &tables,
                            restart_interval,
                            &mut grids,
                        )?;
                    }

                    for sc in &scan {
                        covered[sc.component] = true;
                    }
                    scan_count += 1;
                    if first.is_none() {
                        first = Some(FirstScan {
                            index,
                            scan,
                            tables: tables.clone(),
                            restart_interval,
                        });
                    }
                }
                _ => {}
            }
        }

        let (frame, first) = match (frame, first) {
            (Some(frame), Some(first)) => (frame, first),
            _ => {
                return Err(JpegError::InvalidSegment {
                    segment: "SOS",
                    reason: "no decodable scan",
                });
            }
        };

        let scanned = covered.iter().filter(|&&c| c).count();
        if scanned != covered.len() {
            return Err(JpegError::PartialScan {
                scanned,
                total: covered.len(),
            });
        }

        if !progressive && scan_count == 1 {
            let mut segments = segments;
            segments.truncate(first.index + 1);
            return Ok(Self {
                segments,
                frame,
                scan: first.scan,
                tables: first.tables,
                restart_interval: first.restart_interval,
                grids,
            });
        }

        debug!(
            "Merging {scan_count} {} scans into one baseline scan",
            if progressive { "progressive" } else { "sequential" }
        );
        Self::single_scan(segments, first.index, frame, grids)
    }

    /// 用首个 SOS 之前的段和一个覆盖全部分量的交织扫描重建图像。
    ///
    /// 分量 0 使用 0 号表，其余分量共用 1 号表，与常见编码器的亮度/色度划分一致。
    fn single_scan(
        segments: Vec<Segment>,
        first_sos: usize,
        frame: Frame,
        grids: Vec<BlockGrid>,
    ) -> Result<Self> {
        let table_for = |i: usize| u8::from(i != 0);
        let scan: Vec<ScanComponent> = (0..frame.components.len())
            .map(|component| ScanComponent {
                component,
                dc_table: table_for(component),
                ac_table: table_for(component),
            })
            .collect();
        let selectors: Vec<ScanSelector> = frame
            .components
            .iter()
            .enumerate()
            .map(|(i, c)| ScanSelector {
                component_id: c.id,
                dc_table: table_for(i),
                ac_table: table_for(i),
            })
            .collect();

        let mut header: Vec<Segment> = segments
            .into_iter()
            .take(first_sos)
            .filter(|s| s.marker != marker::DHT && s.marker != marker::DRI)
            .map(|mut s| {
                if s.marker == marker::SOF2 {
                    s.marker = marker::SOF0;
                }
                s
            })
            .collect();
        header.push(Segment {
            marker: marker::SOS,
            data: marker::sos_body(&selectors),
        });

        let tables = optimal_tables(&frame, &scan, 0, &grids)?;
        Ok(Self {
            segments: replace_dht(&header, &tables),
            frame,
            scan,
            tables,
            restart_interval: 0,
            grids,
        })
    }

    pub fn frame(&self) -> &Frame {
        &self.frame
    }

    pub fn component_count(&self) -> usize {
        self.frame.components.len()
    }

    /// 每个分量的系数矩阵 (只含可见块)，按帧中分量顺序排列。
    pub fn coefficient_planes(&self) -> Vec<CoefficientPlane> {
        self.grids
            .iter()
            .enumerate()
            .map(|(i, grid)| {
                let (wide, tall) = self.frame.visible_blocks(i);
                grid.to_plane(wide, tall)
            })
            .collect()
    }

    /// 写回系数矩阵，数量与形状必须和 [`Self::coefficient_planes`] 的结果一致。
    pub fn store_coefficient_planes(&mut self, planes: &[CoefficientPlane]) -> Result<()> {
        if planes.len() != self.grids.len() {
            return Err(JpegError::PlaneCountMismatch {
                given: planes.len(),
                expected: self.grids.len(),
            });
        }
        for (i, plane) in planes.iter().enumerate() {
            let (wide, tall) = self.frame.visible_blocks(i);
            plane.check_shape(i, tall * 8, wide * 8)?;
        }
        for (grid, plane) in self.grids.iter_mut().zip(planes) {
            grid.store_plane(plane);
        }
        Ok(())
    }

    /// 重新编码为 JPEG 字节流。
    ///
    /// 优先沿用原有哈夫曼表；若修改后的系数产生了原表无法编码的符号，
    /// 则按实际符号频率重建所有用到的表。
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match scan::encode(
            &self.frame,
            &self.scan,
            &self.tables,
            self.restart_interval,
            &self.grids,
        ) {
            Ok(entropy) => Ok(self.assemble(&self.segments, &entropy)),
            Err(JpegError::MissingHuffmanCode(symbol)) => {
                warn!(
                    "Huffman table lacks symbol 0x{symbol:02X}, rebuilding optimized tables"
                );
                self.encode_with_rebuilt_tables()
            }
            Err(e) => Err(e),
        }
    }

    fn encode_with_rebuilt_tables(&self) -> Result<Vec<u8>> {
        let tables = optimal_tables(&self.frame, &self.scan, self.restart_interval, &self.grids)?;
        let segments = replace_dht(&self.segments, &tables);
        let entropy = scan::encode(
            &self.frame,
            &self.scan,
            &tables,
            self.restart_interval,
            &self.grids,
        )?;
        Ok(self.assemble(&segments, &entropy))
    }

    fn assemble(&self, segments: &[Segment], entropy: &[u8]) -> Vec<u8> {
        let header: usize = segments.iter().map(|s| s.data.len() + 4).sum();
        let mut out = Vec::with_capacity(header + entropy.len() + 4);
        out.extend_from_slice(&[0xFF, marker::SOI]);
        for segment in segments {
            segment.write_to(&mut out);
        }
        out.extend_from_slice(entropy);
        out.extend_from_slice(&[0xFF, marker::EOI]);
        out
    }
}

/// 把 SOS 选择子映射到帧内分量下标。
fn resolve_selectors(frame: &Frame, selectors: &[ScanSelector]) -> Result<Vec<ScanComponent>> {
    selectors
        .iter()
        .map(|sel| {
            frame
                .components
                .iter()
                .position(|c| c.id == sel.component_id)
                .map(|component| ScanComponent {
                    component,
                    dc_table: sel.dc_table,
                    ac_table: sel.ac_table,
                })
                .ok_or(JpegError::UnknownComponent(sel.component_id))
        })
        .collect()
}

/// 按扫描实际产生的符号频率为每个用到的表号构造最优哈夫曼表。
fn optimal_tables(
    frame: &Frame,
    scan: &[ScanComponent],
    restart_interval: u16,
    grids: &[BlockGrid],
) -> Result<TableSet> {
    let counts = scan::count_symbols(frame, scan, restart_interval, grids)?;

    let mut tables = TableSet::default();
    for sc in scan {
        let (dc, ac) = (usize::from(sc.dc_table), usize::from(sc.ac_table));
        if tables.dc[dc].is_none() {
            tables.insert(optimal_spec(DC_CLASS, sc.dc_table, &counts.dc[dc]));
        }
        if tables.ac[ac].is_none() {
            tables.insert(optimal_spec(AC_CLASS, sc.ac_table, &counts.ac[ac]));
        }
    }
    Ok(tables)
}

/// 丢弃所有旧 DHT，把 `tables` 合并成一个段放在 SOS 之前。
fn replace_dht(segments: &[Segment], tables: &TableSet) -> Vec<Segment> {
    let mut dht = Segment {
        marker: marker::DHT,
        data: Vec::new(),
    };
    for spec in tables.dc.iter().chain(&tables.ac).flatten() {
        spec.write_to(&mut dht.data);
    }

    let mut out: Vec<Segment> = segments
        .iter()
        .filter(|s| s.marker != marker::DHT)
        .cloned()
        .collect();
    out.insert(out.len().saturating_sub(1), dht);
    out
}
