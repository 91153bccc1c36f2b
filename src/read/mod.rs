//! Reads the pose variable out of a cdf v3 container.
//!
//! Only the subset the H3.6M pose exports need is understood: single-file,
//! uncompressed containers holding an uncompressed 2-D zVariable. Record
//! metadata is network byte order; variable data follows the encoding
//! declared in the cdf descriptor.

use nom::bytes::complete::take;
use nom::multi::count;
use nom::number::complete::{be_i32, be_i64, be_u32};
use nom::number::Endianness;
use nom::sequence::pair;
use nom::IResult;

use ndarray::{Array2, ShapeBuilder};

use super::*;

mod utilities;
use utilities::*;

const V3_MAGIC: u32 = 0xCDF3_0001;
const V2_MAGIC: u32 = 0xCDF2_6002;
const UNCOMPRESSED_MAGIC: u32 = 0x0000_FFFF;
const COMPRESSED_MAGIC: u32 = 0xCCCC_0001;

const CDR_RECORD: i32 = 1;
const GDR_RECORD: i32 = 2;
const VXR_RECORD: i32 = 6;
const VVR_RECORD: i32 = 7;
const ZVDR_RECORD: i32 = 8;
const CVVR_RECORD: i32 = 13;

const CDF_REAL4: i32 = 21;
const CDF_REAL8: i32 = 22;
const CDF_FLOAT: i32 = 44;
const CDF_DOUBLE: i32 = 45;

pub(crate) trait Deserialize: Sized {
    fn parse(i: &[u8]) -> IResult<&[u8], Self>;
}

fn record_header(i: &[u8]) -> IResult<&[u8], (i64, i32)> {
    pair(be_i64, be_i32)(i)
}

fn expect_record(rtype: i32) -> impl Fn(&[u8]) -> IResult<&[u8], i64> {
    move |i: &[u8]| {
        let (i, (size, found)) = record_header(i)?;
        if found == rtype {
            Ok((i, size))
        } else {
            Err(nom::Err::Error((i, nom::error::ErrorKind::Verify)))
        }
    }
}

#[derive(Debug)]
pub(crate) struct Cdr {
    pub gdr_offset: u64,
    pub encoding: i32,
    pub flags: i32,
}

impl Deserialize for Cdr {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, _) = expect_record(CDR_RECORD)(i)?;
        let (i, gdr_offset) = be_i64(i)?;
        let (i, _version) = be_i32(i)?;
        let (i, _release) = be_i32(i)?;
        let (i, encoding) = be_i32(i)?;
        let (i, flags) = be_i32(i)?;
        Ok((
            i,
            Cdr {
                gdr_offset: gdr_offset as u64,
                encoding,
                flags,
            },
        ))
    }
}

#[derive(Debug)]
pub(crate) struct Gdr {
    pub z_vdr_head: u64,
    pub n_z_vars: i32,
}

impl Deserialize for Gdr {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, _) = expect_record(GDR_RECORD)(i)?;
        let (i, _r_vdr_head) = be_i64(i)?;
        let (i, z_vdr_head) = be_i64(i)?;
        let (i, _adr_head) = be_i64(i)?;
        let (i, _eof) = be_i64(i)?;
        let (i, _n_r_vars) = be_i32(i)?;
        let (i, _num_attr) = be_i32(i)?;
        let (i, _r_max_rec) = be_i32(i)?;
        let (i, _r_num_dims) = be_i32(i)?;
        let (i, n_z_vars) = be_i32(i)?;
        Ok((
            i,
            Gdr {
                z_vdr_head: z_vdr_head as u64,
                n_z_vars,
            },
        ))
    }
}

#[derive(Debug)]
pub(crate) struct ZVdr {
    pub next: u64,
    pub data_type: i32,
    pub max_rec: i32,
    pub vxr_head: u64,
    pub flags: i32,
    pub num_elems: i32,
    pub name: String,
    pub dims: Vec<usize>,
}

impl Deserialize for ZVdr {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, _) = expect_record(ZVDR_RECORD)(i)?;
        let (i, next) = be_i64(i)?;
        let (i, data_type) = be_i32(i)?;
        let (i, max_rec) = be_i32(i)?;
        let (i, vxr_head) = be_i64(i)?;
        let (i, _vxr_tail) = be_i64(i)?;
        let (i, flags) = be_i32(i)?;
        let (i, _s_records) = be_i32(i)?;
        let (i, _rfu_b) = be_i32(i)?;
        let (i, _rfu_c) = be_i32(i)?;
        let (i, _rfu_f) = be_i32(i)?;
        let (i, num_elems) = be_i32(i)?;
        let (i, _num) = be_i32(i)?;
        let (i, _cpr_offset) = be_i64(i)?;
        let (i, _blocking_factor) = be_i32(i)?;
        let (i, name) = take(256usize)(i)?;
        let (i, z_num_dims) = be_i32(i)?;
        let (i, dims) = count(be_i32, z_num_dims.max(0) as usize)(i)?;
        let (i, _dim_varys) = count(be_i32, z_num_dims.max(0) as usize)(i)?;

        let end = name.iter().position(|&b| b == 0).unwrap_or(name.len());
        let name = String::from_utf8_lossy(&name[..end]).into_owned();

        Ok((
            i,
            ZVdr {
                next: next as u64,
                data_type,
                max_rec,
                vxr_head: vxr_head as u64,
                flags,
                num_elems,
                name,
                dims: dims.into_iter().map(|d| d.max(0) as usize).collect(),
            },
        ))
    }
}

#[derive(Debug)]
pub(crate) struct Vxr {
    pub next: u64,
    /// (first record, last record, target offset) per used entry.
    pub entries: Vec<(i32, i32, u64)>,
}

impl Deserialize for Vxr {
    fn parse(i: &[u8]) -> IResult<&[u8], Self> {
        let (i, _) = expect_record(VXR_RECORD)(i)?;
        let (i, next) = be_i64(i)?;
        let (i, n_entries) = be_i32(i)?;
        let (i, n_used) = be_i32(i)?;
        let (i, first) = count(be_i32, n_entries.max(0) as usize)(i)?;
        let (i, last) = count(be_i32, n_entries.max(0) as usize)(i)?;
        let (i, offsets) = count(be_i64, n_entries.max(0) as usize)(i)?;
        let entries = first
            .into_iter()
            .zip(last.into_iter())
            .zip(offsets.into_iter())
            .map(|((first, last), offset)| (first, last, offset as u64))
            .take(n_used.max(0) as usize)
            .collect();
        Ok((
            i,
            Vxr {
                next: next as u64,
                entries,
            },
        ))
    }
}

fn magic(i: &[u8]) -> IResult<&[u8], (u32, u32)> {
    pair(be_u32, be_u32)(i)
}

fn data_endianness(encoding: i32) -> Result<Endianness, Error> {
    match encoding {
        // NETWORK, SUN, SGi, IBMRS, PPC, HP, NeXT, ARM big
        1 | 2 | 5 | 7 | 9 | 11 | 12 | 18 => Ok(Endianness::Big),
        // VAX, DECSTATION, IBMPC, ALPHAOSF1, ALPHAVMS, ARM little
        3 | 4 | 6 | 13 | 14 | 15 | 16 | 17 => Ok(Endianness::Little),
        e => Err(Error::InvalidInput(format!("unsupported cdf encoding {}", e))),
    }
}

fn slice_at<'a>(file: &'a [u8], offset: u64, what: &str) -> Result<&'a [u8], Error> {
    file.get(offset as usize..)
        .filter(|i| !i.is_empty())
        .ok_or_else(|| {
            Error::InvalidInput(format!("{} offset {:#x} is past the end of the file", what, offset))
        })
}

fn run<T>(res: IResult<&[u8], T>, what: &str) -> Result<T, Error> {
    match res {
        Ok((_, v)) => Ok(v),
        Err(_) => Err(Error::InvalidInput(format!("truncated or malformed {}", what))),
    }
}

fn find_variable(file: &[u8], gdr: &Gdr, name: &str) -> Result<ZVdr, Error> {
    let mut offset = gdr.z_vdr_head;
    for _ in 0..gdr.n_z_vars.max(0) {
        if offset == 0 {
            break;
        }
        let vdr = run(
            ZVdr::parse(slice_at(file, offset, "variable descriptor")?),
            "variable descriptor",
        )?;
        if vdr.name == name {
            return Ok(vdr);
        }
        offset = vdr.next;
    }
    Err(Error::InvalidInput(format!("variable `{}` not found in container", name)))
}

/// Locates one record's bytes by walking the variable's index tree.
fn record_data<'a>(file: &'a [u8], vxr_offset: u64, record: i32, record_bytes: usize) -> Result<&'a [u8], Error> {
    let mut offset = vxr_offset;
    while offset != 0 {
        let vxr = run(
            Vxr::parse(slice_at(file, offset, "variable index record")?),
            "variable index record",
        )?;
        for (first, last, target) in vxr.entries.iter().copied() {
            if record < first || record > last {
                continue;
            }
            let rec = slice_at(file, target, "variable values record")?;
            let (body, (size, rtype)) = match record_header(rec) {
                Ok(v) => v,
                Err(_) => return Err(Error::InvalidInput("truncated variable values record".into())),
            };
            return match rtype {
                // index records may nest one more level
                VXR_RECORD => record_data(file, target, record, record_bytes),
                VVR_RECORD => {
                    let len = (size as usize).saturating_sub(12).min(body.len());
                    let skip = (record - first) as usize * record_bytes;
                    body[..len]
                        .get(skip..skip + record_bytes)
                        .ok_or_else(|| Error::InvalidInput("variable values record is too short".into()))
                }
                CVVR_RECORD => Err(Error::InvalidInput(
                    "compressed variable records are not supported".into(),
                )),
                t => Err(Error::InvalidInput(format!("unexpected record type {} in variable index", t))),
            };
        }
        offset = vxr.next;
    }
    Err(Error::InvalidInput(format!("record {} is missing from the variable index", record)))
}

impl PoseSequence {
    /// Reads the named 2-D pose variable out of an uncompressed cdf v3
    /// container. The variable's first record is the frames x channels
    /// array.
    pub fn parse(file: &[u8], variable: &str) -> Result<Self, Error> {
        let (version, compression) = run(magic(file), "cdf magic")?;
        match version {
            V3_MAGIC => (),
            V2_MAGIC => {
                return Err(Error::InvalidInput("cdf version 2 containers are not supported".into()))
            }
            _ => return Err(Error::InvalidInput("not a cdf container".into())),
        }
        match compression {
            UNCOMPRESSED_MAGIC => (),
            COMPRESSED_MAGIC => {
                return Err(Error::InvalidInput("compressed cdf containers are not supported".into()))
            }
            _ => return Err(Error::InvalidInput("not a cdf container".into())),
        }

        let cdr = run(Cdr::parse(slice_at(file, 8, "cdf descriptor")?), "cdf descriptor")?;
        let endian = data_endianness(cdr.encoding)?;
        let row_major = cdr.flags & 0x1 != 0;
        if cdr.flags & 0x2 == 0 {
            return Err(Error::InvalidInput("multi-file cdf containers are not supported".into()));
        }

        let gdr = run(
            Gdr::parse(slice_at(file, cdr.gdr_offset, "global descriptor")?),
            "global descriptor",
        )?;
        let vdr = find_variable(file, &gdr, variable)?;

        if vdr.flags & 0x4 != 0 {
            return Err(Error::InvalidInput(format!(
                "variable `{}` is compressed, which is not supported",
                variable
            )));
        }
        if vdr.max_rec < 0 {
            return Err(Error::InvalidInput(format!("variable `{}` has no records", variable)));
        }
        if vdr.num_elems != 1 {
            return Err(Error::InvalidInput(format!(
                "variable `{}` is not a plain numeric variable",
                variable
            )));
        }
        let (rows, cols) = match vdr.dims[..] {
            [rows, cols] => (rows, cols),
            _ => {
                return Err(Error::InvalidInput(format!(
                    "variable `{}` is {}-dimensional, expected frames x channels",
                    variable,
                    vdr.dims.len()
                )))
            }
        };

        let width = match vdr.data_type {
            CDF_REAL4 | CDF_FLOAT => 4,
            CDF_REAL8 | CDF_DOUBLE => 8,
            t => {
                return Err(Error::InvalidInput(format!(
                    "variable `{}` has unsupported data type {}",
                    variable, t
                )))
            }
        };

        let n_values = rows * cols;
        let raw = record_data(file, vdr.vxr_head, 0, n_values * width)?;
        let values: Vec<f64> = match width {
            4 => run(f32_values(endian, n_values)(raw), "variable data")?
                .into_iter()
                .map(f64::from)
                .collect(),
            _ => run(f64_values(endian, n_values)(raw), "variable data")?,
        };

        let data = if row_major {
            Array2::from_shape_vec((rows, cols), values)
        } else {
            Array2::from_shape_vec((rows, cols).f(), values)
        };
        let data = data.map_err(|_| {
            Error::InvalidInput(format!("variable `{}` does not match its declared shape", variable))
        })?;
        Ok(PoseSequence { data })
    }
}

#[cfg(test)]
pub(crate) mod samples {
    use nom::number::Endianness;

    fn record(rtype: i32, body: &[u8]) -> Vec<u8> {
        let mut rec = Vec::with_capacity(12 + body.len());
        rec.extend_from_slice(&(12 + body.len() as i64).to_be_bytes());
        rec.extend_from_slice(&rtype.to_be_bytes());
        rec.extend_from_slice(body);
        rec
    }

    fn cdr_body(gdr_offset: u64, encoding: i32, row_major: bool) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&(gdr_offset as i64).to_be_bytes());
        b.extend_from_slice(&3i32.to_be_bytes()); // version
        b.extend_from_slice(&7i32.to_be_bytes()); // release
        b.extend_from_slice(&encoding.to_be_bytes());
        // bit 0 majority, bit 1 single-file
        b.extend_from_slice(&(if row_major { 3i32 } else { 2i32 }).to_be_bytes());
        for _ in 0..5 {
            b.extend_from_slice(&0i32.to_be_bytes());
        }
        b.extend_from_slice(&[0u8; 256]); // copyright
        b
    }

    fn gdr_body(z_vdr_offset: u64) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&0i64.to_be_bytes()); // rVDRhead
        b.extend_from_slice(&(z_vdr_offset as i64).to_be_bytes());
        b.extend_from_slice(&0i64.to_be_bytes()); // ADRhead
        b.extend_from_slice(&0i64.to_be_bytes()); // eof
        b.extend_from_slice(&0i32.to_be_bytes()); // NrVars
        b.extend_from_slice(&0i32.to_be_bytes()); // NumAttr
        b.extend_from_slice(&(-1i32).to_be_bytes()); // rMaxRec
        b.extend_from_slice(&0i32.to_be_bytes()); // rNumDims
        b.extend_from_slice(&1i32.to_be_bytes()); // NzVars
        b.extend_from_slice(&0i64.to_be_bytes()); // UIRhead
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b
    }

    fn z_vdr_body(name: &str, rows: usize, cols: usize, vxr_offset: u64) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&0i64.to_be_bytes()); // next
        b.extend_from_slice(&45i32.to_be_bytes()); // CDF_DOUBLE
        b.extend_from_slice(&0i32.to_be_bytes()); // maxRec
        b.extend_from_slice(&(vxr_offset as i64).to_be_bytes());
        b.extend_from_slice(&(vxr_offset as i64).to_be_bytes());
        b.extend_from_slice(&1i32.to_be_bytes()); // record variance
        b.extend_from_slice(&0i32.to_be_bytes()); // sRecords
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&0i32.to_be_bytes());
        b.extend_from_slice(&1i32.to_be_bytes()); // numElems
        b.extend_from_slice(&0i32.to_be_bytes()); // num
        b.extend_from_slice(&(-1i64).to_be_bytes()); // no CPR/SPR
        b.extend_from_slice(&0i32.to_be_bytes()); // blocking factor
        let mut padded = [0u8; 256];
        padded[..name.len()].copy_from_slice(name.as_bytes());
        b.extend_from_slice(&padded);
        b.extend_from_slice(&2i32.to_be_bytes()); // zNumDims
        b.extend_from_slice(&(rows as i32).to_be_bytes());
        b.extend_from_slice(&(cols as i32).to_be_bytes());
        b.extend_from_slice(&(-1i32).to_be_bytes()); // both dims vary
        b.extend_from_slice(&(-1i32).to_be_bytes());
        b
    }

    fn vxr_body(vvr_offset: u64) -> Vec<u8> {
        let mut b = vec![];
        b.extend_from_slice(&0i64.to_be_bytes()); // next
        b.extend_from_slice(&1i32.to_be_bytes()); // nEntries
        b.extend_from_slice(&1i32.to_be_bytes()); // nUsedEntries
        b.extend_from_slice(&0i32.to_be_bytes()); // first
        b.extend_from_slice(&0i32.to_be_bytes()); // last
        b.extend_from_slice(&(vvr_offset as i64).to_be_bytes());
        b
    }

    /// Builds a minimal single-file uncompressed cdf v3 container holding
    /// one 2-D zVariable with a single record.
    pub(crate) fn pose_container(
        name: &str,
        rows: usize,
        cols: usize,
        values: &[f64],
        row_major: bool,
        endian: Endianness,
    ) -> Vec<u8> {
        assert_eq!(values.len(), rows * cols);

        let encoding = match endian {
            Endianness::Big => 1,    // NETWORK
            Endianness::Little => 6, // IBMPC
        };
        let mut data = Vec::with_capacity(values.len() * 8);
        for v in values {
            match endian {
                Endianness::Big => data.extend_from_slice(&v.to_be_bytes()),
                Endianness::Little => data.extend_from_slice(&v.to_le_bytes()),
            }
        }

        // record sizes are independent of the offsets they carry, so lay the
        // records out once with dummy offsets to learn where they land
        let cdr_at = 8u64;
        let gdr_at = cdr_at + record(super::CDR_RECORD, &cdr_body(0, encoding, row_major)).len() as u64;
        let z_vdr_at = gdr_at + record(super::GDR_RECORD, &gdr_body(0)).len() as u64;
        let vxr_at = z_vdr_at + record(super::ZVDR_RECORD, &z_vdr_body(name, rows, cols, 0)).len() as u64;
        let vvr_at = vxr_at + record(super::VXR_RECORD, &vxr_body(0)).len() as u64;

        let mut file = vec![];
        file.extend_from_slice(&super::V3_MAGIC.to_be_bytes());
        file.extend_from_slice(&super::UNCOMPRESSED_MAGIC.to_be_bytes());
        file.extend(record(super::CDR_RECORD, &cdr_body(gdr_at, encoding, row_major)));
        file.extend(record(super::GDR_RECORD, &gdr_body(z_vdr_at)));
        file.extend(record(super::ZVDR_RECORD, &z_vdr_body(name, rows, cols, vxr_at)));
        file.extend(record(super::VXR_RECORD, &vxr_body(vvr_at)));
        file.extend(record(super::VVR_RECORD, &data));
        file
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn pose_variable_is_read() {
        let values: Vec<f64> = (0..12).map(f64::from).collect();
        let file = samples::pose_container("Pose", 3, 4, &values, true, Endianness::Little);
        let pose = PoseSequence::parse(&file, "Pose").unwrap();
        assert_eq!(pose.len(), 3);
        assert_eq!(pose.channels(), 4);
        assert_eq!(pose.data[[0, 0]], 0.0);
        assert_eq!(pose.data[[1, 2]], 6.0);
        assert_eq!(pose.data[[2, 3]], 11.0);
    }

    #[test]
    fn network_encoded_data_is_read() {
        let values: Vec<f64> = (0..6).map(|v| f64::from(v) / 2.).collect();
        let file = samples::pose_container("Pose", 2, 3, &values, true, Endianness::Big);
        let pose = PoseSequence::parse(&file, "Pose").unwrap();
        assert_eq!(pose.data[[1, 1]], 2.0);
    }

    #[test]
    fn column_major_containers_are_reshaped() {
        // column-major storage of [[0, 1], [2, 3], [4, 5]]
        let values = [0., 2., 4., 1., 3., 5.];
        let file = samples::pose_container("Pose", 3, 2, &values, false, Endianness::Little);
        let pose = PoseSequence::parse(&file, "Pose").unwrap();
        assert_eq!(pose.data[[0, 1]], 1.0);
        assert_eq!(pose.data[[2, 0]], 4.0);
        assert_eq!(pose.data[[2, 1]], 5.0);
    }

    #[test]
    fn missing_variable_is_invalid_input() {
        let file = samples::pose_container("Pose", 1, 2, &[1., 2.], true, Endianness::Little);
        match PoseSequence::parse(&file, "Angles") {
            Err(Error::InvalidInput(msg)) => assert!(msg.contains("Angles")),
            other => panic!("expected InvalidInput, got {:?}", other),
        }
    }

    #[test]
    fn compressed_containers_are_rejected() {
        let mut file = vec![];
        file.extend_from_slice(&V3_MAGIC.to_be_bytes());
        file.extend_from_slice(&COMPRESSED_MAGIC.to_be_bytes());
        assert!(PoseSequence::parse(&file, "Pose").is_err());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(PoseSequence::parse(b"HIERARCHY", "Pose").is_err());
        assert!(PoseSequence::parse(&[], "Pose").is_err());
    }
}
