use nom::multi::count;
use nom::number::complete::{be_f32, be_f64, le_f32, le_f64};
use nom::number::Endianness;
use nom::IResult;

pub(crate) fn f64_values(endian: Endianness, n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<f64>> {
    move |i: &[u8]| match endian {
        Endianness::Big => count(be_f64, n)(i),
        Endianness::Little => count(le_f64, n)(i),
    }
}

pub(crate) fn f32_values(endian: Endianness, n: usize) -> impl Fn(&[u8]) -> IResult<&[u8], Vec<f32>> {
    move |i: &[u8]| match endian {
        Endianness::Big => count(be_f32, n)(i),
        Endianness::Little => count(le_f32, n)(i),
    }
}
