pub mod program_mapper;

pub use program_mapper::ProgramMapper;
