//! Short node-type names used by script-side node editors, mapped to host
//! geometry node types.

const NODE_TYPES: &[(&str, &str)] = &[
    // Mesh primitives
    ("meshcube", "GeometryNodeMeshCube"),
    ("meshcylinder", "GeometryNodeMeshCylinder"),
    ("meshcone", "GeometryNodeMeshCone"),
    ("meshsphere", "GeometryNodeMeshUVSphere"),
    ("meshicosphere", "GeometryNodeMeshIcoSphere"),
    ("meshgrid", "GeometryNodeMeshGrid"),
    ("meshcircle", "GeometryNodeMeshCircle"),
    ("meshline", "GeometryNodeMeshLine"),
    // Curve primitives
    ("curveline", "GeometryNodeCurvePrimitiveLine"),
    ("curvecircle", "GeometryNodeCurvePrimitiveCircle"),
    ("curvestar", "GeometryNodeCurveStar"),
    ("curvespiral", "GeometryNodeCurveSpiral"),
    ("curvequadrilateral", "GeometryNodeCurvePrimitiveQuadrilateral"),
    ("curvebezier", "GeometryNodeCurvePrimitiveBezierSegment"),
    // Geometry operations
    ("transform", "GeometryNodeTransform"),
    ("join", "GeometryNodeJoinGeometry"),
    ("setposition", "GeometryNodeSetPosition"),
    ("setshade", "GeometryNodeSetShadeSmooth"),
    ("subdivide", "GeometryNodeSubdivideMesh"),
    ("subdividesurf", "GeometryNodeSubdivisionSurface"),
    ("extrude", "GeometryNodeExtrudeMesh"),
    ("bevel", "GeometryNodeBevel"),
    ("triangulate", "GeometryNodeTriangulate"),
    ("flip", "GeometryNodeFlipFaces"),
    ("merge", "GeometryNodeMergeByDistance"),
    ("meshboolean", "GeometryNodeMeshBoolean"),
    ("convexhull", "GeometryNodeConvexHull"),
    ("duplicate", "GeometryNodeDuplicateElements"),
    ("delete", "GeometryNodeDeleteGeometry"),
    ("separate", "GeometryNodeSeparateGeometry"),
    // Curve operations
    ("curvetomesh", "GeometryNodeCurveToMesh"),
    ("curvetopoints", "GeometryNodeCurveToPoints"),
    ("meshtocurve", "GeometryNodeMeshToCurve"),
    ("fillcurve", "GeometryNodeFillCurve"),
    ("fillet", "GeometryNodeFilletCurve"),
    ("resample", "GeometryNodeResampleCurve"),
    ("reverse", "GeometryNodeReverseCurve"),
    ("trim", "GeometryNodeTrimCurve"),
    ("setsplinetype", "GeometryNodeCurveSplineType"),
    // Instances
    ("instanceonpoints", "GeometryNodeInstanceOnPoints"),
    ("realizeinstances", "GeometryNodeRealizeInstances"),
    ("rotateinstances", "GeometryNodeRotateInstances"),
    ("scaleinstances", "GeometryNodeScaleInstances"),
    ("translateinstances", "GeometryNodeTranslateInstances"),
    // Input
    ("position", "GeometryNodeInputPosition"),
    ("normal", "GeometryNodeInputNormal"),
    ("index", "GeometryNodeInputIndex"),
    ("id", "GeometryNodeInputID"),
    ("objectinfo", "GeometryNodeObjectInfo"),
    ("collectioninfo", "GeometryNodeCollectionInfo"),
    ("value", "ShaderNodeValue"),
    ("vector", "FunctionNodeInputVector"),
    ("integer", "FunctionNodeInputInt"),
    ("boolean", "FunctionNodeInputBool"),
    ("color", "FunctionNodeInputColor"),
    // Math
    ("math", "ShaderNodeMath"),
    ("vectormath", "ShaderNodeVectorMath"),
    ("compare", "FunctionNodeCompare"),
    ("clamp", "ShaderNodeClamp"),
    ("maprange", "ShaderNodeMapRange"),
    ("mix", "ShaderNodeMix"),
    ("floattoint", "FunctionNodeFloatToInt"),
    ("noise", "ShaderNodeTexNoise"),
    ("voronoi", "ShaderNodeTexVoronoi"),
    ("gradient", "ShaderNodeTexGradient"),
    ("wave", "ShaderNodeTexWave"),
    ("musgrave", "ShaderNodeTexMusgrave"),
    // Utilities
    ("switch", "GeometryNodeSwitch"),
    ("random", "FunctionNodeRandomValue"),
    ("combinexyz", "ShaderNodeCombineXYZ"),
    ("separatexyz", "ShaderNodeSeparateXYZ"),
    ("alignrotationtovector", "FunctionNodeAlignRotationToVector"),
    ("rotatevector", "FunctionNodeRotateVector"),
    // Attributes
    ("storenameattr", "GeometryNodeStoreNamedAttribute"),
    ("namedattr", "GeometryNodeInputNamedAttribute"),
    ("captureattr", "GeometryNodeCaptureAttribute"),
    // Material
    ("setmaterial", "GeometryNodeSetMaterial"),
    ("materialindex", "GeometryNodeInputMaterialIndex"),
    ("setmaterialindex", "GeometryNodeSetMaterialIndex"),
];

/// Host node type for a short name, compared case-insensitively. Unmapped
/// names pass through unchanged so callers can name host types directly.
pub fn host_node_type(short: &str) -> &str {
    NODE_TYPES
        .iter()
        .find(|(name, _)| name.eq_ignore_ascii_case(short))
        .map_or(short, |(_, host)| *host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_names_map_case_insensitively() {
        assert_eq!(host_node_type("meshcube"), "GeometryNodeMeshCube");
        assert_eq!(host_node_type("MeshCube"), "GeometryNodeMeshCube");
        assert_eq!(host_node_type("combineXYZ"), "ShaderNodeCombineXYZ");
        assert_eq!(host_node_type("math"), "ShaderNodeMath");
    }

    #[test]
    fn test_boolean_is_the_input_node() {
        assert_eq!(host_node_type("boolean"), "FunctionNodeInputBool");
        assert_eq!(host_node_type("meshboolean"), "GeometryNodeMeshBoolean");
    }

    #[test]
    fn test_unmapped_passes_through() {
        assert_eq!(host_node_type("GeometryNodeMeshCube"), "GeometryNodeMeshCube");
        assert_eq!(host_node_type("SomethingCustom"), "SomethingCustom");
    }
}
